//! Shared application state wired from configuration and storage

use std::sync::Arc;

use crate::auth::{AccountService, Authenticator, TokenManager};
use crate::config::ServerConfig;
use crate::core::{ChatServer, EventHandler, MessageGateway, RateLimiter};
use crate::storage::Storage;

/// Everything a request or socket handler needs; cheap to clone
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub storage: Storage,
    pub rate_limiter: Arc<RateLimiter>,
    pub authenticator: Arc<Authenticator>,
    pub accounts: Arc<AccountService>,
    pub server: Arc<ChatServer>,
    pub gateway: Arc<MessageGateway>,
    pub events: Arc<EventHandler>,
}

impl AppState {
    pub fn new(config: ServerConfig, storage: Storage) -> Self {
        let timeout = config.storage_timeout;

        let rate_limiter = Arc::new(RateLimiter::new(
            storage.rate_limits.clone(),
            config.rate_limit,
        ));
        let tokens = Arc::new(TokenManager::new(&config.jwt_secret, config.token_ttl));
        let authenticator = Arc::new(Authenticator::new(
            tokens,
            storage.users.clone(),
            storage.revocations.clone(),
            config.session_secret.clone(),
            timeout,
        ));
        let accounts = Arc::new(AccountService::new(
            storage.users.clone(),
            authenticator.clone(),
            timeout,
        ));
        let server = Arc::new(ChatServer::new(
            storage.presence.clone(),
            storage.users.clone(),
            timeout,
        ));
        let gateway = Arc::new(MessageGateway::new(
            storage.messages.clone(),
            server.clone(),
            timeout,
        ));
        let events = Arc::new(EventHandler::new(server.clone(), gateway.clone()));

        Self {
            config: Arc::new(config),
            storage,
            rate_limiter,
            authenticator,
            accounts,
            server,
            gateway,
            events,
        }
    }

    /// Periodic purges of the rate-limit and revocation tables
    pub fn start_background_tasks(&self) {
        self.rate_limiter.clone().start_cleanup_task();
        self.authenticator.clone().start_cleanup_task();
    }
}
