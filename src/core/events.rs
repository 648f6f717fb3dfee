//! Socket frame types
//!
//! Every frame is a JSON text message of the form `{"event": .., "data": ..}`.

use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};

/// Events a client may send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "chat message")]
    ChatMessage(String),
    /// Target user id
    #[serde(rename = "start private chat")]
    StartPrivateChat(String),
    #[serde(rename = "private chat message")]
    PrivateChatMessage {
        #[serde(rename = "roomId")]
        room_id: String,
        message: String,
    },
}

impl ClientEvent {
    pub fn parse(frame: &str) -> Result<Self> {
        serde_json::from_str(frame).map_err(|e| {
            log::debug!("Unparseable client frame: {}", e);
            ChatError::validation("Unrecognized event")
        })
    }
}

/// Events the server emits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "user connected")]
    UserConnected(String),
    #[serde(rename = "user disconnected")]
    UserDisconnected(String),
    #[serde(rename = "chat message")]
    ChatMessage {
        #[serde(rename = "userId")]
        user_id: String,
        message: String,
    },
    /// Room id the receiver has been joined to
    #[serde(rename = "join private chat")]
    JoinPrivateChat(String),
    #[serde(rename = "private chat message")]
    PrivateChatMessage {
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(rename = "userId")]
        user_id: String,
        message: String,
    },
    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }

    pub fn to_frame(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_client_events() {
        assert_eq!(
            ClientEvent::parse(r#"{"event":"chat message","data":"hi"}"#).unwrap(),
            ClientEvent::ChatMessage("hi".to_string())
        );
        assert_eq!(
            ClientEvent::parse(r#"{"event":"private chat message","data":{"roomId":"a-b","message":"yo"}}"#)
                .unwrap(),
            ClientEvent::PrivateChatMessage {
                room_id: "a-b".to_string(),
                message: "yo".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        for frame in [
            r#"{"event":"shutdown","data":null}"#,
            r#"{"event":"chat message","data":42}"#,
            "not json",
        ] {
            let err = ClientEvent::parse(frame).unwrap_err();
            assert_eq!(err.client_message(), "Unrecognized event");
        }
    }

    #[test]
    fn test_server_event_wire_shape() {
        let frame = ServerEvent::PrivateChatMessage {
            room_id: "a-b".to_string(),
            user_id: "a".to_string(),
            message: "hi".to_string(),
        }
        .to_frame()
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(
            value,
            json!({"event": "private chat message", "data": {"roomId": "a-b", "userId": "a", "message": "hi"}})
        );

        let value = serde_json::to_value(ServerEvent::error("nope")).unwrap();
        assert_eq!(value, json!({"event": "error", "data": {"message": "nope"}}));
    }
}
