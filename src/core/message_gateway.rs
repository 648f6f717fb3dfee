//! Persist-then-fan-out path for chat messages
//!
//! REST and socket senders share this gateway, so every message is
//! validated, stored and broadcast the same way regardless of origin.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::core::events::ServerEvent;
use crate::core::server::ChatServer;
use crate::error::{ChatError, Result};
use crate::security::{sanitize_text, validate_message_text, Pagination};
use crate::storage::{with_deadline, MessageStorage, StoredMessage};

/// Who receives the fan-out of a sent message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Every live connection
    All,
    /// Members of one room
    Room(String),
}

/// One page of a user's messages, newest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    pub messages: Vec<StoredMessage>,
    pub total_messages: usize,
    pub total_pages: usize,
    pub current_page: usize,
}

pub struct MessageGateway {
    messages: Arc<dyn MessageStorage>,
    server: Arc<ChatServer>,
    storage_timeout: Duration,
}

impl MessageGateway {
    pub fn new(
        messages: Arc<dyn MessageStorage>,
        server: Arc<ChatServer>,
        storage_timeout: Duration,
    ) -> Self {
        Self {
            messages,
            server,
            storage_timeout,
        }
    }

    /// Validate, persist, then broadcast; nothing is sent if persistence fails.
    /// Length limits apply to the raw text, markup is encoded afterwards.
    pub async fn send(&self, owner_id: &str, text: &str, scope: Scope) -> Result<StoredMessage> {
        if owner_id.trim().is_empty() {
            return Err(ChatError::validation("\"userId\" is required"));
        }
        let text = sanitize_text(&validate_message_text(text)?);

        let stored = with_deadline(
            self.storage_timeout,
            self.messages.create_message(owner_id, &text),
        )
        .await?;

        let reached = match &scope {
            Scope::All => {
                self.server
                    .broadcast(&ServerEvent::ChatMessage {
                        user_id: stored.user_id.clone(),
                        message: stored.message.clone(),
                    })
                    .await
            }
            Scope::Room(room_id) => {
                self.server
                    .broadcast_to_room(
                        room_id,
                        &ServerEvent::PrivateChatMessage {
                            room_id: room_id.clone(),
                            user_id: stored.user_id.clone(),
                            message: stored.message.clone(),
                        },
                    )
                    .await
            }
        };

        debug!(
            "Message {} from {} delivered to {} connections",
            stored.id, owner_id, reached
        );
        Ok(stored)
    }

    /// Load a message and check that `requester_id` owns it
    async fn owned_message(
        &self,
        requester_id: &str,
        message_id: &str,
        action: &str,
    ) -> Result<StoredMessage> {
        let message = with_deadline(self.storage_timeout, self.messages.get_message(message_id))
            .await?
            .ok_or_else(|| ChatError::not_found("Message not found"))?;

        if message.user_id != requester_id {
            warn!(
                "User {} tried to {} message {} owned by {}",
                requester_id, action, message_id, message.user_id
            );
            return Err(ChatError::forbidden(format!(
                "You are not authorized to {} this message",
                action
            )));
        }

        Ok(message)
    }

    pub async fn edit(&self, requester_id: &str, message_id: &str, text: &str) -> Result<StoredMessage> {
        let text = sanitize_text(&validate_message_text(text)?);
        self.owned_message(requester_id, message_id, "update").await?;

        let updated = with_deadline(
            self.storage_timeout,
            self.messages.update_message(message_id, &text),
        )
        .await?
        // Deleted between the ownership check and the write
        .ok_or_else(|| ChatError::not_found("Message not found"))?;

        info!("Message {} updated by {}", message_id, requester_id);
        Ok(updated)
    }

    pub async fn delete(&self, requester_id: &str, message_id: &str) -> Result<()> {
        self.owned_message(requester_id, message_id, "delete").await?;

        let deleted =
            with_deadline(self.storage_timeout, self.messages.delete_message(message_id)).await?;
        if !deleted {
            return Err(ChatError::not_found("Message not found"));
        }

        info!("Message {} deleted by {}", message_id, requester_id);
        Ok(())
    }

    pub async fn list(&self, requester_id: &str, pagination: Pagination) -> Result<MessagePage> {
        let page = pagination.page.max(1);
        let page_size = pagination.page_size.max(1);
        let skip = (page - 1).saturating_mul(page_size);

        let messages = with_deadline(
            self.storage_timeout,
            self.messages
                .list_user_messages(requester_id, skip, page_size),
        )
        .await?;
        let total_messages = with_deadline(
            self.storage_timeout,
            self.messages.count_user_messages(requester_id),
        )
        .await?;

        let total_pages = (total_messages + page_size - 1) / page_size;
        debug!(
            "Fetched messages page {} of {} for {}",
            page, total_pages, requester_id
        );

        Ok(MessagePage {
            messages,
            total_messages,
            total_pages,
            current_page: page,
        })
    }
}
