//! Password hashing with Argon2id
//!
//! Hashing is CPU bound, so both directions run on the blocking pool.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::rngs::OsRng;
use tokio::sync::OnceCell;

use crate::error::{ChatError, Result};

static DUMMY_HASH: OnceCell<String> = OnceCell::const_new();

pub async fn hash_password(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ChatError::Internal(format!("Password hashing failed: {}", e)))
    })
    .await?
}

pub async fn verify_password(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&hash)
            .map_err(|e| ChatError::Internal(format!("Stored password hash is invalid: {}", e)))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await?
}

/// Hash compared against when the account does not exist, so an unknown
/// email costs as much as a wrong password.
pub async fn dummy_hash() -> Result<String> {
    DUMMY_HASH
        .get_or_try_init(|| hash_password("no-such-account-placeholder".to_string()))
        .await
        .cloned()
}
