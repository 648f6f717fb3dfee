//! Abstract storage interfaces for pluggable backends
//!
//! Users and messages form the persistence gateway. Rate-limit counters,
//! presence and revoked tokens are the process-wide tables that must be
//! shared once the server runs as more than one instance.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::rate_limiter::{RateDecision, RateLimitEntry};
use crate::error::Result;

/// Stored user record, including the password hash
#[derive(Debug, Clone)]
pub struct StoredUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub profile_picture: Option<String>,
    pub status: Option<String>,
    pub bio: Option<String>,
    pub is_online: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public projection of a user; never carries the password hash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub profile_picture: Option<String>,
    pub status: Option<String>,
    pub bio: Option<String>,
    pub is_online: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&StoredUser> for UserProfile {
    fn from(user: &StoredUser) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            profile_picture: user.profile_picture.clone(),
            status: user.status.clone(),
            bio: user.bio.clone(),
            is_online: user.is_online,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Fields required to create a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Profile fields a user may change
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub status: Option<String>,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
}

/// Stored chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub id: String,
    pub user_id: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User data storage interface
#[async_trait]
pub trait UserStorage: Send + Sync {
    /// Create a new user; fails with `Conflict` when the email is taken
    async fn create_user(&self, user: NewUser) -> Result<StoredUser>;

    async fn get_user(&self, user_id: &str) -> Result<Option<StoredUser>>;

    /// Lookup by normalized (trimmed, lowercased) email
    async fn get_user_by_email(&self, email: &str) -> Result<Option<StoredUser>>;

    /// Returns false when the user does not exist
    async fn set_online(&self, user_id: &str, online: bool) -> Result<bool>;

    /// Apply a profile update and return the new record
    async fn update_profile(
        &self,
        user_id: &str,
        update: ProfileUpdate,
    ) -> Result<Option<StoredUser>>;

    /// Returns false when the user does not exist
    async fn delete_user(&self, user_id: &str) -> Result<bool>;
}

/// Message storage interface
#[async_trait]
pub trait MessageStorage: Send + Sync {
    async fn create_message(&self, user_id: &str, text: &str) -> Result<StoredMessage>;

    async fn get_message(&self, message_id: &str) -> Result<Option<StoredMessage>>;

    /// Overwrite the text of a message (last write wins)
    async fn update_message(&self, message_id: &str, text: &str)
        -> Result<Option<StoredMessage>>;

    /// Returns false when nothing was deleted
    async fn delete_message(&self, message_id: &str) -> Result<bool>;

    /// Messages owned by `user_id`, newest first
    async fn list_user_messages(
        &self,
        user_id: &str,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<StoredMessage>>;

    async fn count_user_messages(&self, user_id: &str) -> Result<usize>;
}

/// One rate-limit transition, applied atomically by the store
pub type RateLimitStep<'a> =
    &'a (dyn Fn(Option<RateLimitEntry>) -> (Option<RateLimitEntry>, RateDecision) + Send + Sync);

/// Predicate deciding which rate-limit entries survive a purge
pub type RateLimitKeep<'a> = &'a (dyn for<'e> Fn(&'e RateLimitEntry) -> bool + Send + Sync);

/// Key-value table of rate-limit entries
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Read the entry for `key`, run `step` on it and write the result back
    /// without letting another request interleave.
    async fn apply(&self, key: &str, step: RateLimitStep<'_>) -> Result<RateDecision>;

    async fn get(&self, key: &str) -> Result<Option<RateLimitEntry>>;

    /// Keep only the entries for which `keep` is true; returns how many were removed
    async fn retain(&self, keep: RateLimitKeep<'_>) -> Result<usize>;
}

/// Registry of which connection currently represents each online user
#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Record `connection_id` as the user's current connection.
    /// Returns the connection it replaced, if any.
    async fn set_connection(&self, user_id: &str, connection_id: &str) -> Result<Option<String>>;

    /// Clear the user's entry only if `connection_id` is still the current one
    async fn clear_connection(&self, user_id: &str, connection_id: &str) -> Result<bool>;

    async fn connection_for(&self, user_id: &str) -> Result<Option<String>>;

    async fn online_users(&self) -> Result<Vec<String>>;
}

/// Record of a token that was invalidated before it expired
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokedToken {
    /// Keyed fingerprint of the token, never the token itself
    pub fingerprint: String,
    pub user_id: String,
    pub revoked_at: DateTime<Utc>,
    /// When the original token expires (for cleanup)
    pub expires_at: DateTime<Utc>,
}

/// Token revocation storage trait
#[async_trait]
pub trait TokenRevocationStore: Send + Sync {
    async fn revoke(&self, token: RevokedToken) -> Result<()>;

    async fn is_revoked(&self, fingerprint: &str) -> Result<bool>;

    /// Remove revocations whose tokens have expired anyway
    async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}
