//! Chat message endpoints
//!
//! Every route acts on behalf of the authenticated caller; the owner of a
//! new message is never taken from the request body.

use serde_json::{json, Value};
use std::collections::HashMap;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::Rejection;

use crate::app::AppState;
use crate::core::Scope;
use crate::handlers::filters::Authenticated;
use crate::handlers::response::{reject, success};
use crate::security::{sanitize_text, validate_message_body, validate_pagination};

pub async fn list_messages(
    state: AppState,
    auth: Authenticated,
    query: HashMap<String, String>,
) -> Result<Response, Rejection> {
    let pagination = validate_pagination(&query).map_err(reject)?;
    let page = state
        .gateway
        .list(&auth.identity.user_id, pagination)
        .await
        .map_err(reject)?;

    Ok(success(StatusCode::OK, None, Some(page)))
}

pub async fn send_message(
    state: AppState,
    auth: Authenticated,
    body: Value,
) -> Result<Response, Rejection> {
    let text = validate_message_body(&body).map_err(reject)?;
    let message = state
        .gateway
        .send(&auth.identity.user_id, &text, Scope::All)
        .await
        .map_err(reject)?;

    Ok(success(
        StatusCode::CREATED,
        Some("Message sent successfully"),
        Some(json!({ "message": message })),
    ))
}

pub async fn edit_message(
    id: String,
    state: AppState,
    auth: Authenticated,
    body: Value,
) -> Result<Response, Rejection> {
    let id = sanitize_text(&id);
    let text = validate_message_body(&body).map_err(reject)?;
    let message = state
        .gateway
        .edit(&auth.identity.user_id, &id, &text)
        .await
        .map_err(reject)?;

    Ok(success(
        StatusCode::OK,
        Some("Message updated successfully"),
        Some(json!({ "message": message })),
    ))
}

pub async fn delete_message(
    id: String,
    state: AppState,
    auth: Authenticated,
) -> Result<Response, Rejection> {
    let id = sanitize_text(&id);
    state
        .gateway
        .delete(&auth.identity.user_id, &id)
        .await
        .map_err(reject)?;

    Ok(success::<()>(
        StatusCode::OK,
        Some("Message deleted successfully"),
        None,
    ))
}
