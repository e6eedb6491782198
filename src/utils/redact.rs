//! Sensitive-field redaction for log records.

use serde_json::Value;
use std::collections::HashSet;

pub const REDACTED: &str = "[REDACTED]";

/// Replaces the value of every object key found in `sensitive` with
/// [`REDACTED`], at any depth. Keys are compared case-insensitively;
/// `sensitive` must hold lowercase names.
pub fn redact(value: &mut Value, sensitive: &HashSet<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if sensitive.contains(&key.to_ascii_lowercase()) {
                    *child = Value::String(REDACTED.to_string());
                } else {
                    redact(child, sensitive);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                redact(item, sensitive);
            }
        }
        _ => {}
    }
}
