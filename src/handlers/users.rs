//! Registration, login and logout endpoints

use serde_json::{json, Value};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::Rejection;

use crate::app::AppState;
use crate::handlers::filters::Authenticated;
use crate::handlers::response::{reject, success};
use crate::security::{validate_login, validate_register};

pub async fn register(state: AppState, body: Value) -> Result<Response, Rejection> {
    let input = validate_register(&body).map_err(reject)?;
    let user = state.accounts.register(input).await.map_err(reject)?;

    Ok(success(
        StatusCode::CREATED,
        Some("User registered successfully"),
        Some(json!({ "user": user })),
    ))
}

pub async fn login(state: AppState, body: Value) -> Result<Response, Rejection> {
    let input = validate_login(&body).map_err(reject)?;
    let (token, user) = state.accounts.login(input).await.map_err(reject)?;

    Ok(success(
        StatusCode::OK,
        Some("Login successful"),
        Some(json!({ "token": token, "user": user })),
    ))
}

pub async fn logout(state: AppState, auth: Authenticated) -> Result<Response, Rejection> {
    state
        .accounts
        .logout(&auth.identity, &auth.token)
        .await
        .map_err(reject)?;

    Ok(success::<()>(
        StatusCode::OK,
        Some("User logged out successfully"),
        None,
    ))
}
