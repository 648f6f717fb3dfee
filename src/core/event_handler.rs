//! Typed dispatch of client socket events

use log::{debug, error, warn};
use std::sync::Arc;

use crate::core::events::{ClientEvent, ServerEvent};
use crate::core::message_gateway::{MessageGateway, Scope};
use crate::core::server::ChatServer;
use crate::error::Result;
use crate::security::sanitize_text;

/// Per-socket state; room membership itself lives in the `RoomManager`
#[derive(Debug, Clone)]
pub struct ConnectionState {
    pub connection_id: String,
    pub user_id: String,
}

pub struct EventHandler {
    server: Arc<ChatServer>,
    gateway: Arc<MessageGateway>,
}

impl EventHandler {
    pub fn new(server: Arc<ChatServer>, gateway: Arc<MessageGateway>) -> Self {
        Self { server, gateway }
    }

    /// Parse and dispatch one text frame. Failures are reported to the
    /// sender as an `error` event and never broadcast.
    pub async fn handle_frame(&self, state: &ConnectionState, frame: &str) {
        let result = match ClientEvent::parse(frame) {
            Ok(event) => self.dispatch(state, event).await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            if e.is_internal() {
                error!(
                    "Socket event from {} failed: {}",
                    state.connection_id, e
                );
            } else {
                warn!(
                    "Rejected socket event from {}: {}",
                    state.connection_id,
                    e.client_message()
                );
            }
            self.server
                .send_to_connection(&state.connection_id, &ServerEvent::error(e.client_message()))
                .await;
        }
    }

    pub async fn dispatch(&self, state: &ConnectionState, event: ClientEvent) -> Result<()> {
        match event {
            ClientEvent::ChatMessage(text) => {
                self.gateway.send(&state.user_id, &text, Scope::All).await?;
            }
            ClientEvent::StartPrivateChat(target) => {
                let room_id = self
                    .server
                    .start_private_chat(&state.connection_id, &state.user_id, &sanitize_text(&target))
                    .await?;
                debug!("Connection {} joined {}", state.connection_id, room_id);
            }
            ClientEvent::PrivateChatMessage { room_id, message } => {
                let room_id = sanitize_text(&room_id);
                self.server
                    .ensure_member(&state.connection_id, &room_id)
                    .await?;
                self.gateway
                    .send(&state.user_id, &message, Scope::Room(room_id))
                    .await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::connection::Connection;
    use crate::storage::memory::{MemoryMessageStorage, MemoryPresenceStore, MemoryUserStorage};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use warp::ws::Message;

    struct Harness {
        handler: EventHandler,
        server: Arc<ChatServer>,
    }

    fn harness() -> Harness {
        let server = Arc::new(ChatServer::new(
            Arc::new(MemoryPresenceStore::new()),
            Arc::new(MemoryUserStorage::new()),
            Duration::from_secs(5),
        ));
        let gateway = Arc::new(MessageGateway::new(
            Arc::new(MemoryMessageStorage::new()),
            server.clone(),
            Duration::from_secs(5),
        ));
        Harness {
            handler: EventHandler::new(server.clone(), gateway),
            server,
        }
    }

    async fn join(
        server: &ChatServer,
        user: &str,
    ) -> (ConnectionState, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = Connection::new(user.to_string(), tx);
        let state = ConnectionState {
            connection_id: connection.id.clone(),
            user_id: user.to_string(),
        };
        server.connect(connection).await.unwrap();
        (state, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            events.push(serde_json::from_str(frame.to_str().unwrap()).unwrap());
        }
        events
    }

    #[tokio::test]
    async fn test_private_chat_flow() {
        let h = harness();
        let (alice, mut rx_a) = join(&h.server, "alice").await;
        let (bob, mut rx_b) = join(&h.server, "bob").await;
        let (carol, mut rx_c) = join(&h.server, "carol").await;
        drain(&mut rx_a);
        drain(&mut rx_b);
        drain(&mut rx_c);

        h.handler
            .handle_frame(&alice, r#"{"event":"start private chat","data":"bob"}"#)
            .await;
        let room = ServerEvent::JoinPrivateChat("alice-bob".to_string());
        assert_eq!(drain(&mut rx_a), vec![room.clone()]);
        assert_eq!(drain(&mut rx_b), vec![room]);

        h.handler
            .handle_frame(
                &bob,
                r#"{"event":"private chat message","data":{"roomId":"alice-bob","message":"psst"}}"#,
            )
            .await;
        let expected = ServerEvent::PrivateChatMessage {
            room_id: "alice-bob".to_string(),
            user_id: "bob".to_string(),
            message: "psst".to_string(),
        };
        assert_eq!(drain(&mut rx_a), vec![expected.clone()]);
        assert_eq!(drain(&mut rx_b), vec![expected]);
        assert!(drain(&mut rx_c).is_empty());

        h.handler
            .handle_frame(
                &carol,
                r#"{"event":"private chat message","data":{"roomId":"alice-bob","message":"hi"}}"#,
            )
            .await;
        assert_eq!(
            drain(&mut rx_c),
            vec![ServerEvent::error("You are not a member of this room")]
        );
        assert!(drain(&mut rx_a).is_empty());
    }

    #[tokio::test]
    async fn test_invalid_frames_answer_sender_only() {
        let h = harness();
        let (alice, mut rx_a) = join(&h.server, "alice").await;
        let (_bob, mut rx_b) = join(&h.server, "bob").await;
        drain(&mut rx_a);
        drain(&mut rx_b);

        h.handler.handle_frame(&alice, "{{{").await;
        h.handler
            .handle_frame(&alice, r#"{"event":"chat message","data":"   "}"#)
            .await;

        assert_eq!(
            drain(&mut rx_a),
            vec![
                ServerEvent::error("Unrecognized event"),
                ServerEvent::error("\"message\" is not allowed to be empty"),
            ]
        );
        assert!(drain(&mut rx_b).is_empty());
    }

    #[tokio::test]
    async fn test_chat_message_is_sanitized_and_broadcast() {
        let h = harness();
        let (alice, mut rx_a) = join(&h.server, "alice").await;
        drain(&mut rx_a);

        h.handler
            .handle_frame(&alice, r#"{"event":"chat message","data":"<b>hi</b>"}"#)
            .await;
        assert_eq!(
            drain(&mut rx_a),
            vec![ServerEvent::ChatMessage {
                user_id: "alice".to_string(),
                message: "&lt;b&gt;hi&lt;/b&gt;".to_string()
            }]
        );
    }
}
