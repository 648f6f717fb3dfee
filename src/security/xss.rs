//! XSS and query-injection neutralization for inbound data
//!
//! Every string that reaches business logic passes through here first:
//! - markup delimiters are entity-encoded
//! - object keys that could steer a document query (`$op`, `a.b`) are dropped
//! - known script patterns are logged

use serde_json::{Map, Value};

/// Characters that can open or close markup
const HTML_ENTITIES: &[(char, &str)] = &[('<', "&lt;"), ('>', "&gt;")];

/// URL schemes that are never acceptable as a reference
const DANGEROUS_SCHEMES: &[&str] = &["javascript:", "data:", "vbscript:", "file:"];

const XSS_PATTERNS: &[&str] = &[
    "javascript:",
    "vbscript:",
    "data:text/html",
    "<script",
    "</script",
    "<iframe",
    "onload=",
    "onclick=",
    "onerror=",
    "onmouseover=",
    "onfocus=",
    "eval(",
    "expression(",
];

/// Encode markup delimiters
pub fn encode_html(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    for ch in input.chars() {
        match HTML_ENTITIES.iter().find(|(c, _)| *c == ch) {
            Some((_, entity)) => result.push_str(entity),
            None => result.push(ch),
        }
    }
    result
}

/// Check if content contains potential XSS patterns
pub fn contains_xss_patterns(content: &str) -> bool {
    let content_lower = content.to_lowercase();
    XSS_PATTERNS
        .iter()
        .any(|pattern| content_lower.contains(pattern))
}

/// Neutralize a single inbound string
pub fn sanitize_text(input: &str) -> String {
    if contains_xss_patterns(input) {
        log::warn!("Potential XSS pattern detected in input");
    }
    encode_html(input)
}

/// Keys that would be interpreted as operators or paths by a document store
pub fn is_unsafe_key(key: &str) -> bool {
    key.starts_with('$') || key.contains('.')
}

/// Sanitize a JSON value recursively
pub fn sanitize_json_value(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize_text(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_json_value).collect()),
        Value::Object(obj) => {
            let mut sanitized = Map::with_capacity(obj.len());
            for (key, v) in obj {
                if is_unsafe_key(&key) {
                    log::warn!("Dropped prohibited key '{}' from request body", key);
                    continue;
                }
                sanitized.insert(key, sanitize_json_value(v));
            }
            Value::Object(sanitized)
        }
        other => other,
    }
}

/// Drop unsafe keys recursively, leaving string values untouched
pub fn strip_unsafe_keys(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(strip_unsafe_keys).collect()),
        Value::Object(obj) => Value::Object(
            obj.into_iter()
                .filter(|(key, _)| {
                    let unsafe_key = is_unsafe_key(key);
                    if unsafe_key {
                        log::warn!("Dropped prohibited key '{}' from request body", key);
                    }
                    !unsafe_key
                })
                .map(|(key, v)| (key, strip_unsafe_keys(v)))
                .collect(),
        ),
        other => other,
    }
}

/// True for http(s) URLs and relative paths
pub fn is_safe_reference(reference: &str) -> bool {
    let lower = reference.trim().to_lowercase();

    if DANGEROUS_SCHEMES.iter().any(|s| lower.starts_with(s)) {
        log::warn!("Blocked dangerous URL scheme in reference");
        return false;
    }

    if lower.starts_with("http://") || lower.starts_with("https://") {
        return url::Url::parse(reference.trim())
            .map(|u| u.host_str().is_some())
            .unwrap_or(false);
    }

    // Relative path: no scheme, no protocol-relative prefix
    !lower.is_empty() && !lower.starts_with("//") && !lower.contains(':')
}
