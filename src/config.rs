//! Server configuration module
//! Loads and validates the runtime settings of the chat backend

use crate::constants::{
    DEFAULT_HOST, DEFAULT_PORT, DEFAULT_RATE_LIMIT_BLOCK_SECS, DEFAULT_RATE_LIMIT_MAX_REQUESTS,
    DEFAULT_RATE_LIMIT_WINDOW_SECS, DEFAULT_STORAGE_TIMEOUT_SECS, DEFAULT_TOKEN_TTL_SECS,
};
use crate::core::rate_limiter::RateLimitPolicy;
use crate::error::{ChatError, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Server configuration parameters
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Persistence connection string; its scheme selects the storage backend
    pub database_url: String,
    /// Secret used to sign and verify bearer tokens
    pub jwt_secret: String,
    /// Secret used to key server-side session data such as revoked token fingerprints
    pub session_secret: String,
    /// Lifetime of issued bearer tokens
    pub token_ttl: Duration,
    pub rate_limit: RateLimitPolicy,
    /// Honour X-Forwarded-For / X-Real-IP when resolving the client IP
    pub trust_proxy_headers: bool,
    /// Deadline applied to every persistence call made on behalf of a request
    pub storage_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        panic!("ServerConfig::default() is not allowed for security reasons. Use ServerConfig::from_env() instead.");
    }
}

impl ServerConfig {
    /// Create a test configuration - DANGEROUS: Only for testing!
    #[cfg(test)]
    pub fn for_testing() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            database_url: "memory://".to_string(),
            jwt_secret: "unit-jwt-signing-key-7f3a9c2e1b-abcdefghij".to_string(),
            session_secret: "unit-session-key-4d8e6b0a5c-klmnopqrstuv".to_string(),
            token_ttl: Duration::from_secs(DEFAULT_TOKEN_TTL_SECS),
            rate_limit: RateLimitPolicy::default(),
            trust_proxy_headers: false,
            storage_timeout: Duration::from_secs(DEFAULT_STORAGE_TIMEOUT_SECS),
        }
    }

    /// Validate that a secret meets security requirements
    fn validate_secret(secret: &str, secret_type: &str) -> Result<()> {
        if secret.len() < 32 {
            return Err(ChatError::Config(format!(
                "{} secret must be at least 32 characters long",
                secret_type
            )));
        }

        // Check for insecure default or example values
        let insecure_patterns = [
            "your-secret-key",
            "change-this",
            "changeme",
            "default",
            "secret",
            "password",
            "12345678",
        ];

        let lowered = secret.to_lowercase();
        for pattern in &insecure_patterns {
            if lowered.contains(pattern) {
                return Err(ChatError::Config(format!(
                    "{} secret contains insecure pattern '{}'. Please use a secure random secret generated with: openssl rand -base64 32",
                    secret_type, pattern
                )));
            }
        }

        if secret.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ChatError::Config(format!(
                "{} secret should contain mixed characters (letters, numbers, symbols) for security",
                secret_type
            )));
        }

        Ok(())
    }

    fn validate_secrets_are_different(jwt_secret: &str, session_secret: &str) -> Result<()> {
        if jwt_secret == session_secret {
            return Err(ChatError::Config(
                "JWT and session secrets must be different".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_database_url(database_url: &str) -> Result<()> {
        let parsed = url::Url::parse(database_url).map_err(|e| {
            ChatError::Config(format!("DATABASE_URL is not a valid URL: {}", e))
        })?;

        match parsed.scheme() {
            "memory" => Ok(()),
            other => Err(ChatError::Config(format!(
                "Unsupported storage backend '{}'. Supported schemes: memory",
                other
            ))),
        }
    }

    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |primary: &str, fallback: Option<&str>| {
            lookup(primary)
                .or_else(|| fallback.and_then(|key| lookup(key)))
                .filter(|value| !value.trim().is_empty())
        };

        let host = var("RUSTY_CHAT_HOST", None).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_or(var("RUSTY_CHAT_PORT", Some("PORT")), DEFAULT_PORT, "PORT")?;

        let database_url = var("RUSTY_CHAT_DATABASE_URL", Some("DATABASE_URL")).ok_or_else(|| {
            ChatError::Config(
                "DATABASE_URL environment variable is required (e.g. memory://)".to_string(),
            )
        })?;

        let jwt_secret = var("RUSTY_CHAT_JWT_SECRET", Some("JWT_SECRET")).ok_or_else(|| {
            ChatError::Config(
                "JWT_SECRET environment variable is required for security. \
                 Generate one with: openssl rand -base64 32"
                    .to_string(),
            )
        })?;

        let session_secret =
            var("RUSTY_CHAT_SESSION_SECRET", Some("SESSION_SECRET")).ok_or_else(|| {
                ChatError::Config(
                    "SESSION_SECRET environment variable is required. \
                     NOTE: it must be different from JWT_SECRET."
                        .to_string(),
                )
            })?;

        let token_ttl_secs = parse_or(
            var("RUSTY_CHAT_TOKEN_TTL_SECS", None),
            DEFAULT_TOKEN_TTL_SECS,
            "RUSTY_CHAT_TOKEN_TTL_SECS",
        )?;

        let rate_limit = RateLimitPolicy {
            window: Duration::from_secs(parse_or(
                var("RUSTY_CHAT_RATE_LIMIT_WINDOW_SECS", None),
                DEFAULT_RATE_LIMIT_WINDOW_SECS,
                "RUSTY_CHAT_RATE_LIMIT_WINDOW_SECS",
            )?),
            max_requests: parse_or(
                var("RUSTY_CHAT_RATE_LIMIT_MAX_REQUESTS", None),
                DEFAULT_RATE_LIMIT_MAX_REQUESTS,
                "RUSTY_CHAT_RATE_LIMIT_MAX_REQUESTS",
            )?,
            block_duration: Duration::from_secs(parse_or(
                var("RUSTY_CHAT_RATE_LIMIT_BLOCK_SECS", None),
                DEFAULT_RATE_LIMIT_BLOCK_SECS,
                "RUSTY_CHAT_RATE_LIMIT_BLOCK_SECS",
            )?),
        };

        let trust_proxy_headers = var("RUSTY_CHAT_TRUST_PROXY", None)
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false);

        let storage_timeout_secs = parse_or(
            var("RUSTY_CHAT_STORAGE_TIMEOUT_SECS", None),
            DEFAULT_STORAGE_TIMEOUT_SECS,
            "RUSTY_CHAT_STORAGE_TIMEOUT_SECS",
        )?;

        if token_ttl_secs == 0 || storage_timeout_secs == 0 {
            return Err(ChatError::Config(
                "Token TTL and storage timeout must be greater than zero".to_string(),
            ));
        }
        if rate_limit.max_requests == 0 || rate_limit.window.is_zero() {
            return Err(ChatError::Config(
                "Rate limit window and max requests must be greater than zero".to_string(),
            ));
        }

        Self::validate_database_url(&database_url)?;
        Self::validate_secret(&jwt_secret, "JWT")?;
        Self::validate_secret(&session_secret, "Session")?;
        Self::validate_secrets_are_different(&jwt_secret, &session_secret)?;

        Ok(Self {
            host,
            port,
            database_url,
            jwt_secret,
            session_secret,
            token_ttl: Duration::from_secs(token_ttl_secs),
            rate_limit,
            trust_proxy_headers,
            storage_timeout: Duration::from_secs(storage_timeout_secs),
        })
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, default: T, name: &str) -> Result<T> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ChatError::Config(format!("{} has an invalid value: {}", name, value))),
        None => Ok(default),
    }
}
