// Shared helpers for the integration tests
#![allow(dead_code)]

use serde_json::{json, Value};
use std::collections::HashMap;
use warp::http::StatusCode;
use warp::Filter;

use rusty_chat::{routes, AppState, ServerConfig, Storage};

pub const JWT_SECRET: &str = "itest-signing-k3y-9b8e7d6c5a-qrstuvwxyz";
pub const SESSION_SECRET: &str = "itest-session-k3y-1a2b3c4d5e-mnopqrstuv";

pub fn config_with(overrides: &[(&str, &str)]) -> ServerConfig {
    let mut vars: HashMap<String, String> = [
        ("DATABASE_URL", "memory://"),
        ("JWT_SECRET", JWT_SECRET),
        ("SESSION_SECRET", SESSION_SECRET),
        ("RUSTY_CHAT_HOST", "127.0.0.1"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in overrides {
        vars.insert(k.to_string(), v.to_string());
    }
    ServerConfig::from_lookup(|key| vars.get(key).cloned()).expect("test config is valid")
}

pub fn test_state() -> AppState {
    AppState::new(config_with(&[]), Storage::memory())
}

pub fn api(
    state: AppState,
) -> impl Filter<Extract = (impl warp::Reply,), Error = std::convert::Infallible> + Clone {
    routes(state)
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: warp::http::HeaderMap,
    pub body: Value,
}

pub async fn call<F>(
    filter: &F,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Reply
where
    F: Filter + Clone + Send + Sync + 'static,
    F::Extract: warp::Reply + Send,
{
    let mut request = warp::test::request().method(method).path(path);
    if let Some(token) = token {
        request = request.header("authorization", format!("Bearer {}", token));
    }
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request.reply(filter).await;
    let body = if response.body().is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(response.body()).expect("response body is JSON")
    };
    Reply {
        status: response.status(),
        headers: response.headers().clone(),
        body,
    }
}

/// Register and log in; returns (token, user id)
pub async fn signup<F>(filter: &F, name: &str, email: &str) -> (String, String)
where
    F: Filter + Clone + Send + Sync + 'static,
    F::Extract: warp::Reply + Send,
{
    let registered = call(
        filter,
        "POST",
        "/users/register",
        None,
        Some(json!({"name": name, "email": email, "password": "pw12345678"})),
    )
    .await;
    assert_eq!(registered.status, StatusCode::CREATED, "{}", registered.body);

    let login = call(
        filter,
        "POST",
        "/users/login",
        None,
        Some(json!({"email": email, "password": "pw12345678"})),
    )
    .await;
    assert_eq!(login.status, StatusCode::OK, "{}", login.body);

    let token = login.body["data"]["token"].as_str().unwrap().to_string();
    let user_id = login.body["data"]["user"]["id"].as_str().unwrap().to_string();
    (token, user_id)
}
