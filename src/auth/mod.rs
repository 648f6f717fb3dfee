//! Authentication and account management

pub mod accounts;
pub mod authenticator;
pub mod password;
pub mod token;

// Re-export main components
pub use accounts::AccountService;
pub use authenticator::{AuthError, Authenticator, Identity};
pub use token::{extract_bearer_token, token_fingerprint, Claims, TokenManager};
