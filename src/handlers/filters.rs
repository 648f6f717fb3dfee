//! Reusable warp filters: state injection, rate limiting, authentication
//! and sanitized inputs

use serde_json::Value;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use warp::http::HeaderMap;
use warp::{Filter, Rejection};

use crate::app::AppState;
use crate::auth::{extract_bearer_token, Identity};
use crate::constants::MAX_BODY_BYTES;
use crate::core::ip_extractor;
use crate::core::RateDecision;
use crate::error::ChatError;
use crate::handlers::response::reject;
use crate::security::{sanitize_json_value, sanitize_text, strip_unsafe_keys};

/// Caller of a protected route, with the token it presented
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub identity: Identity,
    pub token: String,
}

pub fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// Resolve the client IP, honouring proxy headers only when configured to
pub fn client_ip(
    trust_proxy: bool,
) -> impl Filter<Extract = (IpAddr,), Error = Infallible> + Clone {
    warp::header::headers_cloned()
        .and(warp::addr::remote())
        .map(move |headers: HeaderMap, remote: Option<SocketAddr>| {
            ip_extractor::client_ip(&headers, remote, trust_proxy)
        })
}

/// Count the request against its source IP; rejects once the IP is blocked
pub fn rate_limit(state: AppState) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    client_ip(state.config.trust_proxy_headers)
        .and(with_state(state))
        .and_then(|ip: IpAddr, state: AppState| async move {
            match state.rate_limiter.check(ip).await {
                Ok(RateDecision::Allowed { .. }) => Ok(()),
                Ok(RateDecision::Rejected { retry_after }) => {
                    Err(reject(ChatError::RateLimited { retry_after }))
                }
                Err(e) => Err(reject(e)),
            }
        })
        .untuple_one()
}

/// Require a valid bearer token in the `Authorization` header
pub fn authenticated(
    state: AppState,
) -> impl Filter<Extract = (Authenticated,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_state(state))
        .and_then(|header: Option<String>, state: AppState| async move {
            let token = header
                .as_deref()
                .and_then(extract_bearer_token)
                .map(str::to_string);

            match state.authenticator.authenticate(token.as_deref()).await {
                Ok(identity) => Ok(Authenticated {
                    identity,
                    // authenticate() only succeeds with a token present
                    token: token.unwrap_or_default(),
                }),
                Err(e) => {
                    log::debug!("HTTP authentication failed: {}", e);
                    Err(reject(ChatError::from(e)))
                }
            }
        })
}

/// JSON body with every string sanitized and unsafe keys removed
pub fn sanitized_json() -> impl Filter<Extract = (Value,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES)
        .and(warp::body::json::<Value>())
        .map(sanitize_json_value)
}

/// JSON body with unsafe keys removed; string values stay raw so the
/// message gateway can check lengths before encoding them
pub fn json_body() -> impl Filter<Extract = (Value,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES)
        .and(warp::body::json::<Value>())
        .map(strip_unsafe_keys)
}

/// Query parameters with every value sanitized
pub fn sanitized_query(
) -> impl Filter<Extract = (HashMap<String, String>,), Error = Rejection> + Clone {
    warp::query::<HashMap<String, String>>().map(|query: HashMap<String, String>| {
        query
            .into_iter()
            .map(|(key, value)| (key, sanitize_text(&value)))
            .collect::<HashMap<_, _>>()
    })
}
