use serde_json::{json, Value};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::Rejection;

use crate::app::AppState;
use crate::handlers::filters::Authenticated;
use crate::handlers::response::{reject, success};
use crate::security::validate_profile_update;

pub async fn get_profile(auth: Authenticated) -> Result<Response, Rejection> {
    Ok(success(
        StatusCode::OK,
        None,
        Some(json!({ "user": auth.identity.profile })),
    ))
}

pub async fn update_profile(
    state: AppState,
    auth: Authenticated,
    body: Value,
) -> Result<Response, Rejection> {
    let update = validate_profile_update(&body).map_err(reject)?;
    let user = state
        .accounts
        .update_profile(&auth.identity.user_id, update)
        .await
        .map_err(reject)?;

    Ok(success(
        StatusCode::OK,
        Some("Profile updated successfully"),
        Some(json!({ "user": user })),
    ))
}
