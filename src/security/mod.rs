//! Input sanitization and validation

pub mod validation;
pub mod xss;

pub use validation::{
    normalize_email, validate_login, validate_message_body, validate_message_text,
    validate_pagination, validate_profile_update, validate_register, LoginInput, Pagination,
    RegisterInput,
};
pub use xss::{
    contains_xss_patterns, is_safe_reference, sanitize_json_value, sanitize_text, strip_unsafe_keys,
};
