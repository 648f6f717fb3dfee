use base64::Engine;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use uuid::Uuid;

use crate::error::{ChatError, Result};

/// JWT Claims structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    #[serde(rename = "userId")]
    pub user_id: String,
    /// Issued at (as UTC timestamp)
    pub iat: usize,
    /// Expiration time (as UTC timestamp)
    pub exp: usize,
    /// Unique token id; two tokens issued in the same second still differ
    pub jti: String,
}

impl Claims {
    /// Creates claims valid for `ttl` from now
    pub fn new(user_id: String, ttl: Duration) -> Self {
        let now = chrono::Utc::now().timestamp().max(0) as usize;
        Self {
            user_id,
            iat: now,
            exp: now + ttl.as_secs() as usize,
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp().max(0) as usize;
        now > self.exp
    }
}

/// Manages JWT token operations
pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenManager {
    /// Creates a new token manager with a secret and token lifetime
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    /// Issues a token for the given user
    pub fn issue(&self, user_id: &str) -> Result<String> {
        self.encode(&Claims::new(user_id.to_string(), self.ttl))
    }

    /// Signs arbitrary claims
    pub fn encode(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| ChatError::Internal(format!("Failed to generate token: {}", e)))
    }

    /// Validates signature and expiry and returns the claims
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                log::debug!("Token validation failed: {}", e);
                ChatError::unauthorized("Invalid token")
            })?;

        if claims.user_id.is_empty() {
            return Err(ChatError::unauthorized("Invalid token"));
        }

        Ok(claims)
    }
}

/// Extracts the token from an Authorization header value.
/// Both `Bearer <token>` and a bare token are accepted.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    let trimmed = auth_header.trim();
    let token = match trimmed.get(..6) {
        Some(scheme) if scheme.eq_ignore_ascii_case("bearer") => {
            let rest = &trimmed[6..];
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                rest.trim()
            } else {
                // Raw token that merely starts with "bearer"
                trimmed
            }
        }
        _ => trimmed,
    };

    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Keyed SHA-256 fingerprint of a token, so revocation lists never hold usable tokens
pub fn token_fingerprint(key: &str, token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.update([0u8]);
    hasher.update(token.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize())
}
