//! Rusty Chat - A real-time chat and authentication backend implemented in Rust
//!
//! This library provides REST endpoints for accounts, profiles and messages,
//! plus a WebSocket channel for presence, global broadcast and private rooms.

pub mod app;
pub mod auth;
pub mod config;
pub mod constants;
pub mod core;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod security;
pub mod storage;

// Re-export main components
pub use app::AppState;
pub use config::ServerConfig;
pub use error::{ChatError, Result};
pub use routes::routes;
pub use storage::Storage;
