//! Request handlers for different server endpoints

pub mod filters;
pub mod messages;
pub mod profile;
pub mod response;
pub mod users;
pub mod websocket;

use serde_json::json;
use warp::http::StatusCode;
use warp::reply::Response;

use crate::app::AppState;
use crate::storage::with_deadline;

pub use response::handle_rejection;
pub use websocket::{handle_socket, ws_handshake};

/// Liveness check; also verifies that the presence store answers in time
pub async fn health(state: AppState) -> Result<Response, warp::Rejection> {
    let connections = state.server.connection_count().await;
    let online_users = with_deadline(
        state.config.storage_timeout,
        state.storage.presence.online_users(),
    )
    .await
    .map_err(response::reject)?
    .len();

    Ok(response::success(
        StatusCode::OK,
        None,
        Some(json!({
            "status": "ok",
            "connections": connections,
            "onlineUsers": online_users
        })),
    ))
}
