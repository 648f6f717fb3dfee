use std::error::Error;
use std::fmt;
use std::time::Duration;

use warp::http::StatusCode;

/// Message sent to clients for every 5xx, whatever the real cause was.
pub const GENERIC_SERVER_ERROR: &str = "Server error";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    // Client-correctable input errors
    Validation(String),

    // Auth errors
    Unauthorized(String),
    Forbidden(String),

    // Lookup errors
    NotFound(String),
    Conflict(String),

    // Abuse protection
    RateLimited { retry_after: Duration },

    // Server-side failures, never shown verbatim to clients
    Storage(String),
    Config(String),
    Internal(String),
}

impl ChatError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Storage(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Text that is safe to put in a response body.
    pub fn client_message(&self) -> String {
        match self {
            Self::Validation(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::NotFound(msg)
            | Self::Conflict(msg) => msg.clone(),
            Self::RateLimited { retry_after } => format!(
                "Too many requests. Please try again after {} seconds",
                retry_after_secs(*retry_after)
            ),
            Self::Storage(_) | Self::Config(_) | Self::Internal(_) => {
                GENERIC_SERVER_ERROR.to_string()
            }
        }
    }

    pub fn is_internal(&self) -> bool {
        self.status_code().is_server_error()
    }
}

/// Whole seconds, rounded up, so a client never retries too early.
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs();
    if retry_after.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "Validation error: {}", msg),
            Self::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            Self::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            Self::NotFound(msg) => write!(f, "Not found: {}", msg),
            Self::Conflict(msg) => write!(f, "Conflict: {}", msg),
            Self::RateLimited { retry_after } => {
                write!(f, "Rate limited for {}s", retry_after_secs(*retry_after))
            }
            Self::Storage(msg) => write!(f, "Storage error: {}", msg),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl Error for ChatError {}

impl warp::reject::Reject for ChatError {}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::Internal(format!("JSON serialization failed: {}", err))
    }
}

impl From<tokio::task::JoinError> for ChatError {
    fn from(err: tokio::task::JoinError) -> Self {
        ChatError::Internal(format!("Background task failed: {}", err))
    }
}

// Generic result type for rusty-chat
pub type Result<T> = std::result::Result<T, ChatError>;
