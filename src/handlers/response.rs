//! Response envelopes and central rejection recovery

use log::{debug, error};
use serde::Serialize;
use std::convert::Infallible;
use warp::http::{HeaderValue, StatusCode};
use warp::reply::Response;
use warp::{Rejection, Reply};

use crate::error::{retry_after_secs, ChatError, GENERIC_SERVER_ERROR};

/// `{success, message?, data?}`
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error: &'a str,
}

pub fn success<T: Serialize>(status: StatusCode, message: Option<&str>, data: Option<T>) -> Response {
    let body = Envelope {
        success: true,
        message: message.map(str::to_string),
        data,
    };
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

pub fn error_body(status: StatusCode, message: &str) -> Response {
    let body = ErrorBody {
        success: false,
        error: message,
    };
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

/// Map a `ChatError` to its status and client-safe body
pub fn error_response(err: &ChatError) -> Response {
    let mut response = error_body(err.status_code(), &err.client_message());
    if let ChatError::RateLimited { retry_after } = err {
        if let Ok(value) = HeaderValue::from_str(&retry_after_secs(*retry_after).to_string()) {
            response.headers_mut().insert("retry-after", value);
        }
    }
    response
}

pub fn reject(err: ChatError) -> Rejection {
    warp::reject::custom(err)
}

pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    if let Some(e) = err.find::<ChatError>() {
        if e.is_internal() {
            error!("Request failed: {}", e);
        } else {
            debug!("Request rejected: {}", e);
        }
        return Ok(error_response(e));
    }

    if err.is_not_found() {
        return Ok(error_body(StatusCode::NOT_FOUND, "Route not found"));
    }
    if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        debug!("Malformed request body: {}", e);
        return Ok(error_body(StatusCode::BAD_REQUEST, "Invalid request body"));
    }
    if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        return Ok(error_body(StatusCode::PAYLOAD_TOO_LARGE, "Payload too large"));
    }
    if err.find::<warp::reject::LengthRequired>().is_some() {
        return Ok(error_body(StatusCode::LENGTH_REQUIRED, "Content-Length required"));
    }
    if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        return Ok(error_body(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Content-Type must be application/json",
        ));
    }
    if err.find::<warp::reject::InvalidQuery>().is_some() {
        return Ok(error_body(StatusCode::BAD_REQUEST, "Invalid query string"));
    }
    if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        return Ok(error_body(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"));
    }
    if err.find::<warp::reject::MissingHeader>().is_some()
        || err.find::<warp::reject::InvalidHeader>().is_some()
    {
        return Ok(error_body(StatusCode::BAD_REQUEST, "Invalid request headers"));
    }

    error!("Unhandled rejection: {:?}", err);
    Ok(error_body(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_SERVER_ERROR))
}
