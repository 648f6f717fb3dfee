use std::collections::HashMap;
use std::time::Duration;

use rusty_chat::{ChatError, ServerConfig};

const JWT: &str = "cfg-signing-k3y-2b4d6f8a0c-abcdefghijk";
const SESSION: &str = "cfg-session-k3y-1a3c5e7b9d-lmnopqrstuv";

fn load(pairs: &[(&str, &str)]) -> Result<ServerConfig, ChatError> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    ServerConfig::from_lookup(|key| vars.get(key).cloned())
}

fn error_text(pairs: &[(&str, &str)]) -> String {
    load(pairs).unwrap_err().to_string()
}

#[test]
fn test_valid_configuration_loads() {
    let config = load(&[
        ("DATABASE_URL", "memory://"),
        ("JWT_SECRET", JWT),
        ("SESSION_SECRET", SESSION),
        ("RUSTY_CHAT_TOKEN_TTL_SECS", "600"),
        ("RUSTY_CHAT_TRUST_PROXY", "true"),
        ("RUSTY_CHAT_STORAGE_TIMEOUT_SECS", "2"),
    ])
    .unwrap();

    assert_eq!(config.token_ttl, Duration::from_secs(600));
    assert_eq!(config.storage_timeout, Duration::from_secs(2));
    assert!(config.trust_proxy_headers);
    assert_ne!(config.jwt_secret, config.session_secret);
}

#[test]
fn test_identical_secrets_rejected() {
    let text = error_text(&[
        ("DATABASE_URL", "memory://"),
        ("JWT_SECRET", JWT),
        ("SESSION_SECRET", JWT),
    ]);
    assert!(text.contains("must be different"));
}

#[test]
fn test_short_secret_rejected() {
    let text = error_text(&[
        ("DATABASE_URL", "memory://"),
        ("JWT_SECRET", "tooshort-1"),
        ("SESSION_SECRET", SESSION),
    ]);
    assert!(text.contains("at least 32 characters"));
}

#[test]
fn test_placeholder_secret_rejected() {
    let text = error_text(&[
        ("DATABASE_URL", "memory://"),
        ("JWT_SECRET", "your-secret-key-change-this-in-production"),
        ("SESSION_SECRET", SESSION),
    ]);
    assert!(text.contains("insecure pattern"));
}

#[test]
fn test_letters_only_secret_rejected() {
    let text = error_text(&[
        ("DATABASE_URL", "memory://"),
        ("JWT_SECRET", JWT),
        ("SESSION_SECRET", "abcdefghijklmnopqrstuvwxyzabcdefghij"),
    ]);
    assert!(text.contains("mixed characters"));
}

#[test]
fn test_missing_settings_fail_fast() {
    let no_database = error_text(&[("JWT_SECRET", JWT), ("SESSION_SECRET", SESSION)]);
    assert!(no_database.contains("DATABASE_URL"));

    let no_session = error_text(&[("DATABASE_URL", "memory://"), ("JWT_SECRET", JWT)]);
    assert!(no_session.contains("SESSION_SECRET"));
}

#[test]
fn test_zero_limits_rejected() {
    let text = error_text(&[
        ("DATABASE_URL", "memory://"),
        ("JWT_SECRET", JWT),
        ("SESSION_SECRET", SESSION),
        ("RUSTY_CHAT_RATE_LIMIT_MAX_REQUESTS", "0"),
    ]);
    assert!(text.contains("greater than zero"));
}
