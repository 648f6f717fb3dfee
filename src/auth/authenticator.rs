//! Resolves bearer credentials to user identities
//!
//! Both the HTTP filters and the socket handshake go through
//! [`Authenticator::authenticate`]; they only differ in how the
//! resulting [`AuthError`] is worded for the client.

use chrono::{DateTime, TimeZone, Utc};
use log::{debug, error, info};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::token::{token_fingerprint, TokenManager};
use crate::constants::REVOCATION_CLEANUP_INTERVAL_SECS;
use crate::error::{ChatError, Result};
use crate::storage::{with_deadline, RevokedToken, TokenRevocationStore, UserProfile, UserStorage};

/// Why a credential was not accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No token, or a blank one
    MissingCredential,
    /// Bad signature, expired, malformed or revoked
    InvalidCredential,
    /// Token is valid but its user no longer exists
    UnknownSubject,
    /// The persistence layer failed while resolving the token
    Unavailable(String),
}

impl AuthError {
    /// Wording used when rejecting a socket upgrade
    pub fn into_handshake_error(self) -> ChatError {
        match self {
            AuthError::MissingCredential => {
                ChatError::unauthorized("Authentication token not provided")
            }
            AuthError::InvalidCredential => ChatError::unauthorized("Invalid authentication token"),
            other => other.into(),
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::MissingCredential => write!(f, "missing credential"),
            AuthError::InvalidCredential => write!(f, "invalid credential"),
            AuthError::UnknownSubject => write!(f, "credential subject does not exist"),
            AuthError::Unavailable(cause) => write!(f, "authentication unavailable: {}", cause),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<AuthError> for ChatError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredential => ChatError::unauthorized("No token provided"),
            AuthError::InvalidCredential => ChatError::unauthorized("Invalid token"),
            AuthError::UnknownSubject => ChatError::not_found("User not found"),
            AuthError::Unavailable(cause) => ChatError::Storage(cause),
        }
    }
}

/// Authenticated caller
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub profile: UserProfile,
}

pub struct Authenticator {
    tokens: Arc<TokenManager>,
    users: Arc<dyn UserStorage>,
    revocations: Arc<dyn TokenRevocationStore>,
    session_secret: String,
    storage_timeout: Duration,
}

impl Authenticator {
    pub fn new(
        tokens: Arc<TokenManager>,
        users: Arc<dyn UserStorage>,
        revocations: Arc<dyn TokenRevocationStore>,
        session_secret: String,
        storage_timeout: Duration,
    ) -> Self {
        Self {
            tokens,
            users,
            revocations,
            session_secret,
            storage_timeout,
        }
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Verify a raw token and load the user it belongs to
    pub async fn authenticate(&self, credential: Option<&str>) -> std::result::Result<Identity, AuthError> {
        let token = match credential.map(str::trim) {
            Some(token) if !token.is_empty() => token,
            _ => return Err(AuthError::MissingCredential),
        };

        let claims = self
            .tokens
            .verify(token)
            .map_err(|_| AuthError::InvalidCredential)?;

        let fingerprint = token_fingerprint(&self.session_secret, token);
        let revoked = with_deadline(self.storage_timeout, self.revocations.is_revoked(&fingerprint))
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;
        if revoked {
            debug!("Rejected revoked token for user {}", claims.user_id);
            return Err(AuthError::InvalidCredential);
        }

        let user = with_deadline(self.storage_timeout, self.users.get_user(&claims.user_id))
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?
            .ok_or(AuthError::UnknownSubject)?;

        Ok(Identity {
            user_id: user.id.clone(),
            profile: UserProfile::from(&user),
        })
    }

    /// Invalidate a token before its natural expiry
    pub async fn revoke(&self, token: &str, user_id: &str) -> Result<()> {
        let claims = self.tokens.verify(token)?;
        let expires_at = Utc
            .timestamp_opt(claims.exp as i64, 0)
            .single()
            .unwrap_or_else(Utc::now);

        let record = RevokedToken {
            fingerprint: token_fingerprint(&self.session_secret, token),
            user_id: user_id.to_string(),
            revoked_at: Utc::now(),
            expires_at,
        };
        with_deadline(self.storage_timeout, self.revocations.revoke(record)).await?;
        info!("Revoked token for user {}", user_id);
        Ok(())
    }

    /// Drop revocation records whose tokens are expired anyway
    pub async fn purge_expired_revocations(&self, now: DateTime<Utc>) -> Result<usize> {
        self.revocations.cleanup_expired(now).await
    }

    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(REVOCATION_CLEANUP_INTERVAL_SECS));
            loop {
                interval.tick().await;
                match self.purge_expired_revocations(Utc::now()).await {
                    Ok(0) => {}
                    Ok(removed) => debug!("Removed {} expired token revocations", removed),
                    Err(e) => error!("Failed to clean up token revocations: {}", e),
                }
            }
        });
    }
}
