//! Single redaction policy, consulted both when building an error's `data`
//! field and (by callers who opt in) before logging it. Consolidates what
//! would otherwise be duplicated sensitive-key lists scattered across
//! modules.

use serde_json::Value;

const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "passwd",
    "secret",
    "token",
    "api_key",
    "apikey",
    "authorization",
    "auth",
    "credential",
    "cookie",
    "session_id",
    "private_key",
];

const REDACTED: &str = "[redacted]";

/// Recursively walk a JSON value, replacing the value of any object key
/// that looks sensitive, and redacting string values that look like
/// filesystem paths or bearer tokens even under an innocuous key.
pub fn scrub(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    if is_sensitive_key(k) {
                        (k.clone(), Value::String(REDACTED.to_string()))
                    } else {
                        (k.clone(), scrub(v))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(scrub).collect()),
        Value::String(s) if looks_sensitive(s) => Value::String(REDACTED.to_string()),
        other => other.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    SENSITIVE_KEYS.iter().any(|k| lower.contains(k))
}

fn looks_sensitive(s: &str) -> bool {
    s.starts_with("Bearer ")
        || s.starts_with("sk-")
        || (s.starts_with('/') && s.len() > 1)
        || s.contains("://") && s.contains('@')
}
