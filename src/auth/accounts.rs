//! Registration, login, logout and profile management

use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::authenticator::{Authenticator, Identity};
use crate::auth::password::{dummy_hash, hash_password, verify_password};
use crate::error::{ChatError, Result};
use crate::security::{LoginInput, RegisterInput};
use crate::storage::{with_deadline, NewUser, ProfileUpdate, UserProfile, UserStorage};

const INVALID_CREDENTIALS: &str = "Invalid credentials";

pub struct AccountService {
    users: Arc<dyn UserStorage>,
    authenticator: Arc<Authenticator>,
    storage_timeout: Duration,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserStorage>,
        authenticator: Arc<Authenticator>,
        storage_timeout: Duration,
    ) -> Self {
        Self {
            users,
            authenticator,
            storage_timeout,
        }
    }

    pub async fn register(&self, input: RegisterInput) -> Result<UserProfile> {
        let password_hash = hash_password(input.password).await?;
        let user = with_deadline(
            self.storage_timeout,
            self.users.create_user(NewUser {
                name: input.name,
                email: input.email,
                password_hash,
            }),
        )
        .await?;

        info!("User {} registered", user.id);
        Ok(UserProfile::from(&user))
    }

    /// Returns a fresh token and the user's profile
    pub async fn login(&self, input: LoginInput) -> Result<(String, UserProfile)> {
        let user = with_deadline(
            self.storage_timeout,
            self.users.get_user_by_email(&input.email),
        )
        .await?;

        let user = match user {
            Some(user) => user,
            None => {
                // Same hashing cost as a wrong password
                verify_password(input.password, dummy_hash().await?).await?;
                warn!("Login attempt for unknown account");
                return Err(ChatError::unauthorized(INVALID_CREDENTIALS));
            }
        };

        if !verify_password(input.password, user.password_hash.clone()).await? {
            warn!("Failed login for user {}", user.id);
            return Err(ChatError::unauthorized(INVALID_CREDENTIALS));
        }

        let token = self.authenticator.tokens().issue(&user.id)?;
        with_deadline(self.storage_timeout, self.users.set_online(&user.id, true)).await?;

        let mut profile = UserProfile::from(&user);
        profile.is_online = true;
        info!("User {} logged in", user.id);
        Ok((token, profile))
    }

    /// Mark the user offline and revoke the presented token
    pub async fn logout(&self, identity: &Identity, token: &str) -> Result<()> {
        with_deadline(
            self.storage_timeout,
            self.users.set_online(&identity.user_id, false),
        )
        .await?;
        self.authenticator.revoke(token, &identity.user_id).await?;
        info!("User {} logged out", identity.user_id);
        Ok(())
    }

    pub async fn update_profile(&self, user_id: &str, update: ProfileUpdate) -> Result<UserProfile> {
        let user = with_deadline(
            self.storage_timeout,
            self.users.update_profile(user_id, update),
        )
        .await?
        .ok_or_else(|| ChatError::not_found("User not found"))?;

        info!("User {} updated their profile", user_id);
        Ok(UserProfile::from(&user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::TokenManager;
    use crate::storage::memory::{MemoryTokenRevocationStore, MemoryUserStorage};

    fn service() -> AccountService {
        let users: Arc<dyn UserStorage> = Arc::new(MemoryUserStorage::new());
        let authenticator = Arc::new(Authenticator::new(
            Arc::new(TokenManager::new(
                "unit-jwt-signing-key-7f3a9c2e1b-abcdefghij",
                Duration::from_secs(3600),
            )),
            users.clone(),
            Arc::new(MemoryTokenRevocationStore::new()),
            "unit-session-key-4d8e6b0a5c-klmnopqrstuv".to_string(),
            Duration::from_secs(5),
        ));
        AccountService::new(users, authenticator, Duration::from_secs(5))
    }

    fn alice() -> RegisterInput {
        RegisterInput {
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "pw12345678".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_twice_conflicts() {
        let accounts = service();
        accounts.register(alice()).await.unwrap();
        let err = accounts.register(alice()).await.unwrap_err();
        assert_eq!(err, ChatError::Conflict("Email already registered".to_string()));
    }

    #[tokio::test]
    async fn test_login_failures_look_the_same() {
        let accounts = service();
        accounts.register(alice()).await.unwrap();

        let wrong_password = accounts
            .login(LoginInput {
                email: "alice@example.com".to_string(),
                password: "not-the-password".to_string(),
            })
            .await
            .unwrap_err();
        let unknown_email = accounts
            .login(LoginInput {
                email: "bob@example.com".to_string(),
                password: "pw12345678".to_string(),
            })
            .await
            .unwrap_err();

        assert_eq!(wrong_password, unknown_email);
        assert_eq!(wrong_password.client_message(), "Invalid credentials");
    }

    #[tokio::test]
    async fn test_login_marks_online() {
        let accounts = service();
        accounts.register(alice()).await.unwrap();
        let (token, profile) = accounts
            .login(LoginInput {
                email: "alice@example.com".to_string(),
                password: "pw12345678".to_string(),
            })
            .await
            .unwrap();
        assert!(!token.is_empty());
        assert!(profile.is_online);
    }
}
