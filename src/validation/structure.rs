//! Depth, array length and string length limits over a parsed body.

use serde_json::Value;

use crate::config::ValidationConfig;

/// Display name of the root value in field paths.
pub const ROOT: &str = "body";

/// A hard structural failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructureViolation {
    TooDeep { path: String, limit: usize },
    ArrayTooLong { path: String, len: usize, limit: usize },
    StringTooLong { path: String, len: usize, limit: usize },
}

impl StructureViolation {
    pub fn code(&self) -> &'static str {
        match self {
            Self::TooDeep { .. } => "VAL_DEPTH",
            Self::ArrayTooLong { .. } => "VAL_ARRAY_LENGTH",
            Self::StringTooLong { .. } => "VAL_STRING_LENGTH",
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::TooDeep { path, .. }
            | Self::ArrayTooLong { path, .. }
            | Self::StringTooLong { path, .. } => path,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::TooDeep { limit, .. } => format!("nesting exceeds maximum depth of {limit}"),
            Self::ArrayTooLong { len, limit, .. } => {
                format!("array has {len} items, maximum is {limit}")
            }
            Self::StringTooLong { len, limit, .. } => {
                format!("string has {len} characters, maximum is {limit}")
            }
        }
    }
}

/// `parent.key`, or just `key` at the root.
pub fn join_key(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

/// `parent[index]`; root arrays render as `body[index]`.
pub fn join_index(parent: &str, index: usize) -> String {
    if parent.is_empty() {
        format!("{ROOT}[{index}]")
    } else {
        format!("{parent}[{index}]")
    }
}

pub fn display_path(path: &str) -> &str {
    if path.is_empty() { ROOT } else { path }
}

/// Walks `value` enforcing the configured limits.
///
/// Over-long strings are cut to `max_string_length` characters in place
/// when `truncate_long_strings` is on; their paths are returned.
pub fn enforce(
    value: &mut Value,
    config: &ValidationConfig,
) -> Result<Vec<String>, StructureViolation> {
    let mut truncated = Vec::new();
    walk(value, "", 0, config, &mut truncated)?;
    Ok(truncated)
}

fn walk(
    value: &mut Value,
    path: &str,
    depth: usize,
    config: &ValidationConfig,
    truncated: &mut Vec<String>,
) -> Result<(), StructureViolation> {
    match value {
        Value::Object(map) => {
            let depth = enter(path, depth, config)?;
            for (key, child) in map.iter_mut() {
                walk(child, &join_key(path, key), depth, config, truncated)?;
            }
        }
        Value::Array(items) => {
            let depth = enter(path, depth, config)?;
            if items.len() > config.max_array_length {
                return Err(StructureViolation::ArrayTooLong {
                    path: display_path(path).to_string(),
                    len: items.len(),
                    limit: config.max_array_length,
                });
            }
            for (index, child) in items.iter_mut().enumerate() {
                walk(child, &join_index(path, index), depth, config, truncated)?;
            }
        }
        Value::String(s) => {
            let len = s.chars().count();
            if len > config.max_string_length {
                if !config.truncate_long_strings {
                    return Err(StructureViolation::StringTooLong {
                        path: display_path(path).to_string(),
                        len,
                        limit: config.max_string_length,
                    });
                }
                *s = s.chars().take(config.max_string_length).collect();
                truncated.push(display_path(path).to_string());
            }
        }
        _ => {}
    }
    Ok(())
}

fn enter(path: &str, depth: usize, config: &ValidationConfig) -> Result<usize, StructureViolation> {
    let depth = depth + 1;
    if depth > config.max_json_depth {
        return Err(StructureViolation::TooDeep {
            path: display_path(path).to_string(),
            limit: config.max_json_depth,
        });
    }
    Ok(depth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nested(depth: usize) -> Value {
        let mut value = json!("leaf");
        for _ in 0..depth {
            value = json!({ "a": value });
        }
        value
    }

    #[test]
    fn test_depth_at_limit_passes() {
        let config = ValidationConfig::default();
        let mut value = nested(10);
        assert!(enforce(&mut value, &config).is_ok());
    }

    #[test]
    fn test_depth_over_limit_names_path() {
        let config = ValidationConfig::default();
        let mut value = nested(11);
        let err = enforce(&mut value, &config).unwrap_err();

        assert_eq!(err.code(), "VAL_DEPTH");
        assert_eq!(err.path(), vec!["a"; 10].join("."));
    }

    #[test]
    fn test_array_length_is_hard_failure() {
        let config = ValidationConfig {
            max_array_length: 3,
            ..ValidationConfig::default()
        };
        let mut value = json!({ "items": [1, 2, 3, 4] });
        let err = enforce(&mut value, &config).unwrap_err();

        assert_eq!(err.code(), "VAL_ARRAY_LENGTH");
        assert_eq!(err.path(), "items");
    }

    #[test]
    fn test_long_strings_are_truncated() {
        let config = ValidationConfig {
            max_string_length: 5,
            ..ValidationConfig::default()
        };
        let mut value = json!({ "list": [{ "name": "abcdefgh" }], "ok": "abc" });
        let truncated = enforce(&mut value, &config).unwrap();

        assert_eq!(truncated, vec!["list[0].name".to_string()]);
        assert_eq!(value["list"][0]["name"], "abcde");
        assert_eq!(value["ok"], "abc");
    }

    #[test]
    fn test_long_strings_rejected_without_truncation() {
        let config = ValidationConfig {
            max_string_length: 2,
            truncate_long_strings: false,
            ..ValidationConfig::default()
        };
        let mut value = json!("abc");
        let err = enforce(&mut value, &config).unwrap_err();

        assert_eq!(err.code(), "VAL_STRING_LENGTH");
        assert_eq!(err.path(), "body");
    }

    #[test]
    fn test_truncation_counts_characters() {
        let config = ValidationConfig {
            max_string_length: 3,
            ..ValidationConfig::default()
        };
        let mut value = json!(["h\u{e9}llo"]);
        let truncated = enforce(&mut value, &config).unwrap();

        assert_eq!(truncated, vec!["body[0]".to_string()]);
        assert_eq!(value[0], "h\u{e9}l");
    }
}
