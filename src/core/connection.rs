//! WebSocket connection management
//! Handles the lifecycle of client connections

use chrono::{DateTime, Utc};
use log::warn;
use tokio::sync::mpsc;
use uuid::Uuid;
use warp::ws::Message;

use crate::core::events::ServerEvent;

/// Represents the state of a single WebSocket connection
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: String,
    /// Authenticated owner of the socket
    pub user_id: String,
    pub sender: mpsc::UnboundedSender<Message>,
    pub connected_at: DateTime<Utc>,
}

impl Connection {
    /// Create a new connection with a unique ID
    pub fn new(user_id: String, sender: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            sender,
            connected_at: Utc::now(),
        }
    }

    /// Send a text message through this connection
    pub fn send_text(&self, text: &str) -> bool {
        match self.sender.send(Message::text(text)) {
            Ok(_) => true,
            Err(_) => {
                warn!("Failed to send message to connection {}", self.id);
                false
            }
        }
    }

    pub fn send_event(&self, event: &ServerEvent) -> bool {
        match event.to_frame() {
            Ok(frame) => self.send_text(&frame),
            Err(e) => {
                warn!("Failed to encode event for connection {}: {}", self.id, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_event_writes_json_frame() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = Connection::new("user-1".to_string(), tx);
        assert!(conn.send_event(&ServerEvent::UserConnected("user-1".to_string())));

        let frame = rx.try_recv().unwrap();
        let json: serde_json::Value = serde_json::from_str(frame.to_str().unwrap()).unwrap();
        assert_eq!(json["event"], "user connected");
        assert_eq!(json["data"], "user-1");
    }

    #[test]
    fn test_send_to_closed_channel_fails() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let conn = Connection::new("user-1".to_string(), tx);
        assert!(!conn.send_text("hi"));
    }
}
