//! In-memory storage implementation for development and testing
//!
//! Keeps every table in process memory behind `tokio::sync::RwLock`.
//! Restarting the process clears all data.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::traits::*;
use crate::core::rate_limiter::{RateDecision, RateLimitEntry};
use crate::error::{ChatError, Result};

/// In-memory user storage
pub struct MemoryUserStorage {
    users: Arc<RwLock<HashMap<String, StoredUser>>>,
    emails: Arc<RwLock<HashMap<String, String>>>, // email -> user_id
}

impl MemoryUserStorage {
    pub fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
            emails: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryUserStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStorage for MemoryUserStorage {
    async fn create_user(&self, user: NewUser) -> Result<StoredUser> {
        // Lock order: emails, then users
        let mut emails = self.emails.write().await;
        if emails.contains_key(&user.email) {
            return Err(ChatError::Conflict("Email already registered".to_string()));
        }

        let now = Utc::now();
        let stored = StoredUser {
            id: Uuid::new_v4().to_string(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            profile_picture: None,
            status: None,
            bio: None,
            is_online: false,
            created_at: now,
            updated_at: now,
        };

        let mut users = self.users.write().await;
        emails.insert(stored.email.clone(), stored.id.clone());
        users.insert(stored.id.clone(), stored.clone());

        Ok(stored)
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<StoredUser>> {
        Ok(self.users.read().await.get(user_id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<StoredUser>> {
        let user_id = match self.emails.read().await.get(email) {
            Some(id) => id.clone(),
            None => return Ok(None),
        };
        self.get_user(&user_id).await
    }

    async fn set_online(&self, user_id: &str, online: bool) -> Result<bool> {
        let mut users = self.users.write().await;
        match users.get_mut(user_id) {
            Some(user) => {
                user.is_online = online;
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: ProfileUpdate,
    ) -> Result<Option<StoredUser>> {
        let mut users = self.users.write().await;
        let user = match users.get_mut(user_id) {
            Some(user) => user,
            None => return Ok(None),
        };

        if let Some(status) = update.status {
            user.status = Some(status);
        }
        if let Some(bio) = update.bio {
            user.bio = Some(bio);
        }
        if let Some(picture) = update.profile_picture {
            user.profile_picture = Some(picture);
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool> {
        let mut emails = self.emails.write().await;
        let mut users = self.users.write().await;
        match users.remove(user_id) {
            Some(user) => {
                emails.remove(&user.email);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Default)]
struct MessageTable {
    // Insertion sequence -> message; iteration order is creation order
    by_seq: BTreeMap<u64, StoredMessage>,
    seq_by_id: HashMap<String, u64>,
    next_seq: u64,
}

/// In-memory message storage
pub struct MemoryMessageStorage {
    table: Arc<RwLock<MessageTable>>,
}

impl MemoryMessageStorage {
    pub fn new() -> Self {
        Self {
            table: Arc::new(RwLock::new(MessageTable::default())),
        }
    }
}

impl Default for MemoryMessageStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStorage for MemoryMessageStorage {
    async fn create_message(&self, user_id: &str, text: &str) -> Result<StoredMessage> {
        let now = Utc::now();
        let message = StoredMessage {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            message: text.to_string(),
            created_at: now,
            updated_at: now,
        };

        let mut table = self.table.write().await;
        let seq = table.next_seq;
        table.next_seq += 1;
        table.seq_by_id.insert(message.id.clone(), seq);
        table.by_seq.insert(seq, message.clone());

        Ok(message)
    }

    async fn get_message(&self, message_id: &str) -> Result<Option<StoredMessage>> {
        let table = self.table.read().await;
        Ok(table
            .seq_by_id
            .get(message_id)
            .and_then(|seq| table.by_seq.get(seq))
            .cloned())
    }

    async fn update_message(
        &self,
        message_id: &str,
        text: &str,
    ) -> Result<Option<StoredMessage>> {
        let mut table = self.table.write().await;
        let seq = match table.seq_by_id.get(message_id) {
            Some(seq) => *seq,
            None => return Ok(None),
        };

        Ok(table.by_seq.get_mut(&seq).map(|message| {
            message.message = text.to_string();
            message.updated_at = Utc::now();
            message.clone()
        }))
    }

    async fn delete_message(&self, message_id: &str) -> Result<bool> {
        let mut table = self.table.write().await;
        match table.seq_by_id.remove(message_id) {
            Some(seq) => Ok(table.by_seq.remove(&seq).is_some()),
            None => Ok(false),
        }
    }

    async fn list_user_messages(
        &self,
        user_id: &str,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<StoredMessage>> {
        let table = self.table.read().await;
        Ok(table
            .by_seq
            .values()
            .rev()
            .filter(|message| message.user_id == user_id)
            .skip(skip)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count_user_messages(&self, user_id: &str) -> Result<usize> {
        let table = self.table.read().await;
        Ok(table
            .by_seq
            .values()
            .filter(|message| message.user_id == user_id)
            .count())
    }
}

/// In-memory rate-limit table
pub struct MemoryRateLimitStore {
    entries: RwLock<HashMap<String, RateLimitEntry>>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryRateLimitStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn apply(&self, key: &str, step: RateLimitStep<'_>) -> Result<RateDecision> {
        let mut entries = self.entries.write().await;
        let current = entries.remove(key);
        let (next, decision) = step(current);
        if let Some(entry) = next {
            entries.insert(key.to_string(), entry);
        }
        Ok(decision)
    }

    async fn get(&self, key: &str) -> Result<Option<RateLimitEntry>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn retain(&self, keep: RateLimitKeep<'_>) -> Result<usize> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| keep(entry));
        Ok(before - entries.len())
    }
}

/// In-memory user -> connection registry
pub struct MemoryPresenceStore {
    connections: RwLock<HashMap<String, String>>,
}

impl MemoryPresenceStore {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryPresenceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PresenceStore for MemoryPresenceStore {
    async fn set_connection(&self, user_id: &str, connection_id: &str) -> Result<Option<String>> {
        Ok(self
            .connections
            .write()
            .await
            .insert(user_id.to_string(), connection_id.to_string()))
    }

    async fn clear_connection(&self, user_id: &str, connection_id: &str) -> Result<bool> {
        let mut connections = self.connections.write().await;
        match connections.get(user_id) {
            Some(current) if current == connection_id => {
                connections.remove(user_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn connection_for(&self, user_id: &str) -> Result<Option<String>> {
        Ok(self.connections.read().await.get(user_id).cloned())
    }

    async fn online_users(&self) -> Result<Vec<String>> {
        Ok(self.connections.read().await.keys().cloned().collect())
    }
}

/// In-memory implementation of the token revocation store
pub struct MemoryTokenRevocationStore {
    revoked_tokens: RwLock<HashMap<String, RevokedToken>>,
}

impl MemoryTokenRevocationStore {
    pub fn new() -> Self {
        Self {
            revoked_tokens: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryTokenRevocationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenRevocationStore for MemoryTokenRevocationStore {
    async fn revoke(&self, token: RevokedToken) -> Result<()> {
        self.revoked_tokens
            .write()
            .await
            .insert(token.fingerprint.clone(), token);
        Ok(())
    }

    async fn is_revoked(&self, fingerprint: &str) -> Result<bool> {
        Ok(self.revoked_tokens.read().await.contains_key(fingerprint))
    }

    async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut revoked_tokens = self.revoked_tokens.write().await;
        let before = revoked_tokens.len();
        revoked_tokens.retain(|_, token| token.expires_at > now);
        Ok(before - revoked_tokens.len())
    }
}
