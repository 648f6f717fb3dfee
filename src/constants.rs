// Fundamental configuration constants
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const WS_PATH: &str = "ws";

// Credential lifetime
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

// Per-IP rate limiting
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
pub const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u32 = 100;
pub const DEFAULT_RATE_LIMIT_BLOCK_SECS: u64 = 300;
pub const RATE_LIMIT_CLEANUP_INTERVAL_SECS: u64 = 300;
pub const REVOCATION_CLEANUP_INTERVAL_SECS: u64 = 3600;

// Request limits
pub const DEFAULT_STORAGE_TIMEOUT_SECS: u64 = 10;
pub const MAX_BODY_BYTES: u64 = 64 * 1024;
pub const MAX_MESSAGE_LENGTH: usize = 2000;
pub const MAX_NAME_LENGTH: usize = 100;
pub const MAX_STATUS_LENGTH: usize = 100;
pub const MAX_BIO_LENGTH: usize = 500;
pub const MIN_PASSWORD_LENGTH: usize = 8;

// Pagination
pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;
