//! Per-endpoint input rules
//!
//! Each validator takes an already sanitized JSON body and returns a typed
//! input, or the first failing rule as a `ChatError::Validation`.

use serde_json::Value;
use std::collections::HashMap;

use crate::constants::{
    DEFAULT_PAGE, DEFAULT_PAGE_SIZE, MAX_BIO_LENGTH, MAX_MESSAGE_LENGTH, MAX_NAME_LENGTH,
    MAX_PAGE_SIZE, MAX_STATUS_LENGTH, MIN_PASSWORD_LENGTH,
};
use crate::error::{ChatError, Result};
use crate::security::xss::is_safe_reference;
use crate::storage::ProfileUpdate;

const CREDENTIALS_REQUIRED: &str = "Email and password are required";
const INVALID_PAGINATION: &str = "page and pageSize must be positive integers";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterInput {
    pub name: String,
    /// Trimmed and lowercased
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub page_size: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Lowercased, trimmed form used as the unique email key
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Minimal shape check: one `@`, non-empty local part, dotted domain, no spaces
pub fn is_valid_email(email: &str) -> bool {
    let mut parts = email.split('@');
    let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => (local, domain),
        _ => return false,
    };

    if local.is_empty() || email.chars().any(char::is_whitespace) {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
}

fn field<'a>(body: &'a Value, name: &str) -> Option<&'a Value> {
    body.get(name).filter(|v| !v.is_null())
}

/// Joi-style rules for a required, trimmed string field
fn required_string(body: &Value, name: &str, max_len: usize) -> Result<String> {
    let value = match field(body, name) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(_) => return Err(ChatError::validation(format!("\"{}\" must be a string", name))),
        None => return Err(ChatError::validation(format!("\"{}\" is required", name))),
    };

    if value.is_empty() {
        return Err(ChatError::validation(format!(
            "\"{}\" is not allowed to be empty",
            name
        )));
    }
    if value.chars().count() > max_len {
        return Err(ChatError::validation(format!(
            "\"{}\" length must be less than or equal to {} characters long",
            name, max_len
        )));
    }

    Ok(value)
}

fn credential(body: &Value, name: &str) -> Result<String> {
    match field(body, name) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        _ => Err(ChatError::validation(CREDENTIALS_REQUIRED)),
    }
}

pub fn validate_register(body: &Value) -> Result<RegisterInput> {
    let name = required_string(body, "name", MAX_NAME_LENGTH)?;
    let email = credential(body, "email")?;
    let password = credential(body, "password")?;

    let email = normalize_email(&email);
    if !is_valid_email(&email) {
        return Err(ChatError::validation("Invalid email format"));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ChatError::validation(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        )));
    }

    Ok(RegisterInput {
        name,
        email,
        password,
    })
}

pub fn validate_login(body: &Value) -> Result<LoginInput> {
    let email = credential(body, "email")?;
    let password = credential(body, "password")?;
    Ok(LoginInput {
        email: normalize_email(&email),
        password,
    })
}

/// Rules shared by the REST body and socket frames
pub fn validate_message_text(text: &str) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ChatError::validation("\"message\" is not allowed to be empty"));
    }
    if trimmed.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(ChatError::validation(format!(
            "\"message\" length must be less than or equal to {} characters long",
            MAX_MESSAGE_LENGTH
        )));
    }
    Ok(trimmed.to_string())
}

pub fn validate_message_body(body: &Value) -> Result<String> {
    match field(body, "message") {
        Some(Value::String(s)) => validate_message_text(s),
        Some(_) => Err(ChatError::validation("\"message\" must be a string")),
        None => Err(ChatError::validation("\"message\" is required")),
    }
}

pub fn validate_profile_update(body: &Value) -> Result<ProfileUpdate> {
    let status = required_string(body, "status", MAX_STATUS_LENGTH)?;
    let bio = required_string(body, "bio", MAX_BIO_LENGTH)?;

    let profile_picture = match field(body, "profilePicture") {
        None => None,
        Some(Value::String(s)) if is_safe_reference(s) => Some(s.trim().to_string()),
        Some(_) => {
            return Err(ChatError::validation(
                "\"profilePicture\" must be an http(s) URL or a relative path",
            ))
        }
    };

    Ok(ProfileUpdate {
        status: Some(status),
        bio: Some(bio),
        profile_picture,
    })
}

fn positive(raw: Option<&String>, default: usize) -> Result<usize> {
    match raw {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(ChatError::validation(INVALID_PAGINATION)),
        },
    }
}

pub fn validate_pagination(query: &HashMap<String, String>) -> Result<Pagination> {
    let page = positive(query.get("page"), DEFAULT_PAGE)?;
    let page_size = positive(query.get("pageSize"), DEFAULT_PAGE_SIZE)?;
    if page_size > MAX_PAGE_SIZE {
        return Err(ChatError::validation(INVALID_PAGINATION));
    }
    Ok(Pagination { page, page_size })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message_of(err: ChatError) -> String {
        assert!(matches!(err, ChatError::Validation(_)));
        err.client_message()
    }

    #[test]
    fn test_register_rules_in_order() {
        let err = validate_register(&json!({"email": "a@b.co", "password": "pw12345678"}));
        assert_eq!(message_of(err.unwrap_err()), "\"name\" is required");

        let err = validate_register(&json!({"name": "A", "password": "pw12345678"}));
        assert_eq!(message_of(err.unwrap_err()), "Email and password are required");

        let err = validate_register(&json!({"name": "A", "email": "nope", "password": "pw12345678"}));
        assert_eq!(message_of(err.unwrap_err()), "Invalid email format");

        let err = validate_register(&json!({"name": "A", "email": "a@b.co", "password": "short"}));
        assert_eq!(
            message_of(err.unwrap_err()),
            "Password must be at least 8 characters long"
        );

        let ok = validate_register(&json!({
            "name": "  Alice ",
            "email": " Alice@Example.COM ",
            "password": "pw12345678"
        }))
        .unwrap();
        assert_eq!(ok.name, "Alice");
        assert_eq!(ok.email, "alice@example.com");
    }

    #[test]
    fn test_email_shape() {
        assert!(is_valid_email("alice@example.com"));
        assert!(!is_valid_email("alice@example"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("a@b@c.com"));
        assert!(!is_valid_email("a b@c.com"));
        assert!(!is_valid_email("a@.com"));
    }

    #[test]
    fn test_message_rules() {
        assert_eq!(
            message_of(validate_message_body(&json!({})).unwrap_err()),
            "\"message\" is required"
        );
        assert_eq!(
            message_of(validate_message_body(&json!({"message": "   "})).unwrap_err()),
            "\"message\" is not allowed to be empty"
        );
        assert!(validate_message_text(&"x".repeat(MAX_MESSAGE_LENGTH + 1)).is_err());
        assert_eq!(validate_message_body(&json!({"message": " hi "})).unwrap(), "hi");
    }

    #[test]
    fn test_profile_rules() {
        assert_eq!(
            message_of(validate_profile_update(&json!({"bio": "b"})).unwrap_err()),
            "\"status\" is required"
        );
        assert_eq!(
            message_of(validate_profile_update(&json!({"status": "s"})).unwrap_err()),
            "\"bio\" is required"
        );
        assert!(validate_profile_update(&json!({
            "status": "s", "bio": "b", "profilePicture": "javascript:alert(1)"
        }))
        .is_err());

        let update = validate_profile_update(&json!({
            "status": " busy ", "bio": "hello", "profilePicture": "/img/me.png"
        }))
        .unwrap();
        assert_eq!(update.status.as_deref(), Some("busy"));
        assert_eq!(update.profile_picture.as_deref(), Some("/img/me.png"));
    }

    #[test]
    fn test_pagination() {
        let mut query = HashMap::new();
        assert_eq!(validate_pagination(&query).unwrap(), Pagination::default());

        query.insert("page".to_string(), "2".to_string());
        query.insert("pageSize".to_string(), "5".to_string());
        assert_eq!(
            validate_pagination(&query).unwrap(),
            Pagination { page: 2, page_size: 5 }
        );

        for bad in ["0", "-1", "abc", "1.5"] {
            query.insert("page".to_string(), bad.to_string());
            assert_eq!(
                message_of(validate_pagination(&query).unwrap_err()),
                "page and pageSize must be positive integers"
            );
        }

        query.insert("page".to_string(), "1".to_string());
        query.insert("pageSize".to_string(), "101".to_string());
        assert!(validate_pagination(&query).is_err());
    }
}
