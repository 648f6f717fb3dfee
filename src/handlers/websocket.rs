use futures_util::sink::SinkExt;
use futures_util::stream::StreamExt;
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;
use warp::http::HeaderMap;
use warp::reply::Response;
use warp::ws::{WebSocket, Ws};
use warp::{Rejection, Reply};

use crate::app::AppState;
use crate::auth::{extract_bearer_token, Identity};
use crate::core::{ChatServer, Connection, ConnectionState, EventHandler};
use crate::handlers::response::reject;

const SUBPROTOCOL_PREFIX: &str = "bearer.";

/// Token presented during the upgrade and, when it came from the
/// subprotocol list, the entry to echo back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeCredential {
    pub token: String,
    pub protocol: Option<String>,
}

/// Extract the token from headers only, in priority order:
/// `Authorization`, `X-Auth-Token`, then a `bearer.<token>` subprotocol.
pub fn handshake_credential(headers: &HeaderMap) -> Option<HandshakeCredential> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    if let Some(token) = header("authorization").and_then(extract_bearer_token) {
        debug!("Token extracted from Authorization header");
        return Some(HandshakeCredential {
            token: token.to_string(),
            protocol: None,
        });
    }

    if let Some(token) = header("x-auth-token").map(str::trim).filter(|t| !t.is_empty()) {
        debug!("Token extracted from X-Auth-Token header");
        return Some(HandshakeCredential {
            token: token.to_string(),
            protocol: None,
        });
    }

    let protocols = header("sec-websocket-protocol")?;
    protocols
        .split(',')
        .map(str::trim)
        .find_map(|protocol| {
            let token = protocol.strip_prefix(SUBPROTOCOL_PREFIX)?;
            (!token.is_empty()).then(|| HandshakeCredential {
                token: token.to_string(),
                protocol: Some(protocol.to_string()),
            })
        })
}

/// Authenticate the upgrade request, then hand the socket to [`handle_socket`]
pub async fn ws_handshake(ws: Ws, headers: HeaderMap, state: AppState) -> Result<Response, Rejection> {
    let credential = handshake_credential(&headers);
    let identity = state
        .authenticator
        .authenticate(credential.as_ref().map(|c| c.token.as_str()))
        .await
        .map_err(|e| {
            warn!("Socket handshake rejected: {}", e);
            reject(e.into_handshake_error())
        })?;

    let server = state.server.clone();
    let events = state.events.clone();
    let reply = ws.on_upgrade(move |socket| handle_socket(socket, identity, server, events));

    Ok(match credential.and_then(|c| c.protocol) {
        Some(protocol) => {
            warp::reply::with_header(reply, "sec-websocket-protocol", protocol).into_response()
        }
        None => reply.into_response(),
    })
}

/// Drive one authenticated socket until it closes
pub async fn handle_socket(
    ws: WebSocket,
    identity: Identity,
    server: Arc<ChatServer>,
    events: Arc<EventHandler>,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    // Spawn a task to forward messages from our channel to the WebSocket
    tokio::task::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = ws_tx.send(message).await {
                debug!("Failed to send WebSocket message: {}", e);
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    let connection = Connection::new(identity.user_id.clone(), tx);
    let state = ConnectionState {
        connection_id: connection.id.clone(),
        user_id: identity.user_id,
    };

    if let Err(e) = server.connect(connection).await {
        error!("Failed to register connection {}: {}", state.connection_id, e);
        if let Err(e) = server.disconnect(&state.connection_id).await {
            error!("Failed to clean up connection {}: {}", state.connection_id, e);
        }
        return;
    }
    info!("Current connections: {}", server.connection_count().await);

    while let Some(result) = ws_rx.next().await {
        match result {
            Ok(msg) if msg.is_close() => break,
            Ok(msg) => {
                // Binary, ping and pong frames are ignored
                if let Ok(text) = msg.to_str() {
                    events.handle_frame(&state, text).await;
                }
            }
            Err(e) => {
                warn!("WebSocket error on {}: {}", state.connection_id, e);
                break;
            }
        }
    }

    if let Err(e) = server.disconnect(&state.connection_id).await {
        error!("Failed to unregister connection {}: {}", state.connection_id, e);
    }
    info!("Current connections: {}", server.connection_count().await);
}

#[cfg(test)]
mod tests {
    use super::*;
    use warp::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_credential_priority() {
        let all = headers(&[
            ("authorization", "Bearer from-auth"),
            ("x-auth-token", "from-custom"),
            ("sec-websocket-protocol", "chat, bearer.from-proto"),
        ]);
        assert_eq!(handshake_credential(&all).unwrap().token, "from-auth");

        let custom = headers(&[
            ("x-auth-token", "from-custom"),
            ("sec-websocket-protocol", "bearer.from-proto"),
        ]);
        assert_eq!(handshake_credential(&custom).unwrap().token, "from-custom");

        let proto = headers(&[("sec-websocket-protocol", "chat, bearer.from-proto")]);
        assert_eq!(
            handshake_credential(&proto).unwrap(),
            HandshakeCredential {
                token: "from-proto".to_string(),
                protocol: Some("bearer.from-proto".to_string()),
            }
        );
    }

    #[test]
    fn test_no_credential() {
        assert!(handshake_credential(&HeaderMap::new()).is_none());
        let blank = headers(&[("x-auth-token", "  "), ("sec-websocket-protocol", "bearer.")]);
        assert!(handshake_credential(&blank).is_none());
    }
}
