//! Persistence gateway and shared state tables

pub mod memory;
pub mod traits;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ChatError, Result};
use memory::{
    MemoryMessageStorage, MemoryPresenceStore, MemoryRateLimitStore, MemoryTokenRevocationStore,
    MemoryUserStorage,
};
pub use traits::{
    MessageStorage, NewUser, PresenceStore, ProfileUpdate, RateLimitStore, RevokedToken,
    StoredMessage, StoredUser, TokenRevocationStore, UserProfile, UserStorage,
};

/// Every backend the server needs, selected together from one URL
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn UserStorage>,
    pub messages: Arc<dyn MessageStorage>,
    pub rate_limits: Arc<dyn RateLimitStore>,
    pub presence: Arc<dyn PresenceStore>,
    pub revocations: Arc<dyn TokenRevocationStore>,
}

impl Storage {
    pub fn memory() -> Self {
        Self {
            users: Arc::new(MemoryUserStorage::new()),
            messages: Arc::new(MemoryMessageStorage::new()),
            rate_limits: Arc::new(MemoryRateLimitStore::new()),
            presence: Arc::new(MemoryPresenceStore::new()),
            revocations: Arc::new(MemoryTokenRevocationStore::new()),
        }
    }

    /// Build the backend named by the URL scheme
    pub fn from_url(database_url: &str) -> Result<Self> {
        let parsed = url::Url::parse(database_url)
            .map_err(|e| ChatError::Config(format!("Invalid storage URL: {}", e)))?;

        match parsed.scheme() {
            "memory" => {
                log::info!("Using in-memory storage; data is lost on restart");
                Ok(Self::memory())
            }
            other => Err(ChatError::Config(format!(
                "Unsupported storage backend '{}'",
                other
            ))),
        }
    }
}

/// Run a persistence call with a deadline; a timeout surfaces as a storage error
pub async fn with_deadline<T, F>(limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ChatError::Storage(format!(
            "Storage call timed out after {}ms",
            limit.as_millis()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_url_selects_backend() {
        assert!(Storage::from_url("memory://").is_ok());
        assert!(Storage::from_url("postgres://localhost/chat").is_err());
        assert!(Storage::from_url("not a url").is_err());
    }

    #[tokio::test]
    async fn test_with_deadline_times_out() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, ChatError>(1)
        };
        let err = with_deadline(Duration::from_millis(10), slow).await.unwrap_err();
        assert!(matches!(err, ChatError::Storage(_)));

        let fast = async { Ok::<_, ChatError>(2) };
        assert_eq!(with_deadline(Duration::from_secs(1), fast).await.unwrap(), 2);
    }
}
