//! Core functionality for the chat server

pub mod connection;
pub mod event_handler;
pub mod events;
pub mod ip_extractor;
pub mod message_gateway;
pub mod rate_limiter;
pub mod room;
pub mod server;

// Re-export main components for convenience
pub use connection::Connection;
pub use event_handler::{ConnectionState, EventHandler};
pub use events::{ClientEvent, ServerEvent};
pub use message_gateway::{MessageGateway, MessagePage, Scope};
pub use rate_limiter::{RateDecision, RateLimitPolicy, RateLimiter};
pub use room::{private_room_id, RoomManager};
pub use server::ChatServer;
