use serde_json::{Map, Value};

use crate::config::ValidationConfig;
use crate::domain::context::SecurityEvent;
use crate::error::{AppError, FieldErrors};
use crate::validation::patterns::{detect_sql_injection, detect_xss};
use crate::validation::sanitize::sanitize_value;
use crate::validation::structure::{self, ROOT, display_path, join_index, join_key};

pub const ACCEPTED_CONTENT_TYPES: [&str; 3] = [
    "application/json",
    "application/x-www-form-urlencoded",
    "text/plain",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Json,
    Form,
    Text,
}

impl BodyKind {
    /// Maps a `Content-Type` header value, ignoring parameters and case.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "application/json" => Some(Self::Json),
            "application/x-www-form-urlencoded" => Some(Self::Form),
            "text/plain" => Some(Self::Text),
            _ => None,
        }
    }
}

/// An accepted request.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Validated {
    /// Re-encoded body, present only when truncation or sanitization changed it.
    pub body: Option<Vec<u8>>,
    pub truncated_fields: Vec<String>,
    pub sanitized_fields: usize,
}

/// A rejected request and the security events it raised.
#[derive(Debug)]
pub struct Rejection {
    pub error: AppError,
    pub events: Vec<SecurityEvent>,
}

impl From<AppError> for Rejection {
    fn from(error: AppError) -> Self {
        Self {
            error,
            events: Vec::new(),
        }
    }
}

/// Runs every check over one request, in order, and returns the accepted
/// (possibly rewritten) body or the first failure.
pub fn validate_request(
    config: &ValidationConfig,
    content_type: Option<&str>,
    query: Option<&str>,
    body: &[u8],
) -> Result<Validated, Rejection> {
    if body.len() > config.max_request_size_bytes {
        return Err(size_error(config.max_request_size_bytes).into());
    }

    let query: Vec<(String, String)> = query
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let mut parsed = if body.is_empty() {
        None
    } else {
        let kind = content_type
            .and_then(BodyKind::from_content_type)
            .ok_or_else(|| content_type_error(content_type))?;
        Some((kind, parse_body(kind, body)?))
    };

    let mut outcome = Validated::default();
    if let Some((_, value)) = parsed.as_mut() {
        outcome.truncated_fields = structure::enforce(value, config).map_err(|v| {
            AppError::invalid_field(v.code(), v.path(), v.message())
        })?;
    }

    {
        let mut strings = Vec::new();
        if let Some((_, value)) = parsed.as_ref() {
            collect_strings(value, "", &mut strings);
        }
        strings.extend(
            query
                .iter()
                .map(|(name, value)| (format!("query.{name}"), value.as_str())),
        );

        if config.enable_xss_protection {
            reject_matches(&strings, detect_xss, Detector::Xss)?;
        }
        if config.enable_sql_injection_protection {
            reject_matches(&strings, detect_sql_injection, Detector::SqlInjection)?;
        }
    }

    if let Some((kind, mut value)) = parsed {
        if config.enable_input_sanitization {
            outcome.sanitized_fields = sanitize_value(&mut value, config.sanitize_html);
        }
        if outcome.sanitized_fields > 0 || !outcome.truncated_fields.is_empty() {
            outcome.body = Some(encode_body(kind, &value)?);
        }
    }

    Ok(outcome)
}

pub fn size_error(limit: usize) -> AppError {
    AppError::invalid_field(
        "VAL_SIZE",
        ROOT,
        format!("request body exceeds maximum size of {limit} bytes"),
    )
}

fn content_type_error(content_type: Option<&str>) -> AppError {
    let received = content_type.unwrap_or("none");
    AppError::invalid_field(
        "VAL_CONTENT_TYPE",
        "content_type",
        format!(
            "unsupported content type '{received}', expected one of: {}",
            ACCEPTED_CONTENT_TYPES.join(", ")
        ),
    )
}

fn malformed(message: impl Into<String>) -> AppError {
    AppError::invalid_field("VAL_MALFORMED", ROOT, message)
}

fn parse_body(kind: BodyKind, body: &[u8]) -> Result<Value, AppError> {
    match kind {
        BodyKind::Json => serde_json::from_slice(body)
            .map_err(|e| malformed(format!("invalid JSON: {e}"))),
        BodyKind::Form => {
            let map: Map<String, Value> = url::form_urlencoded::parse(body)
                .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
                .collect();
            Ok(Value::Object(map))
        }
        BodyKind::Text => std::str::from_utf8(body)
            .map(|s| Value::String(s.to_string()))
            .map_err(|_| malformed("text body is not valid UTF-8")),
    }
}

fn encode_body(kind: BodyKind, value: &Value) -> Result<Vec<u8>, AppError> {
    match (kind, value) {
        (BodyKind::Json, value) => serde_json::to_vec(value)
            .map_err(|e| AppError::unclassified(format!("re-encoding body: {e}"))),
        (BodyKind::Form, Value::Object(map)) => {
            let mut serializer = url::form_urlencoded::Serializer::new(String::new());
            for (key, value) in map {
                serializer.append_pair(key, value.as_str().unwrap_or_default());
            }
            Ok(serializer.finish().into_bytes())
        }
        (BodyKind::Text, Value::String(s)) => Ok(s.clone().into_bytes()),
        _ => Err(AppError::unclassified("body shape changed during validation")),
    }
}

/// Every string the caller controls, with its field path. Object keys are
/// included too, reported as `<parent>#key` so the key itself is never
/// echoed back.
fn collect_strings<'a>(value: &'a Value, path: &str, out: &mut Vec<(String, &'a str)>) {
    match value {
        Value::String(s) => out.push((display_path(path).to_string(), s.as_str())),
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                collect_strings(item, &join_index(path, index), out);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                out.push((format!("{}#key", display_path(path)), key.as_str()));
                collect_strings(item, &join_key(path, key), out);
            }
        }
        _ => {}
    }
}

#[derive(Clone, Copy)]
enum Detector {
    Xss,
    SqlInjection,
}

fn reject_matches(
    strings: &[(String, &str)],
    detect: fn(&str) -> bool,
    detector: Detector,
) -> Result<(), Rejection> {
    let hits: Vec<&String> = strings
        .iter()
        .filter(|(_, s)| detect(s))
        .map(|(path, _)| path)
        .collect();
    if hits.is_empty() {
        return Ok(());
    }

    let (code, message) = match detector {
        Detector::Xss => ("VAL_XSS", "contains a disallowed script pattern"),
        Detector::SqlInjection => ("VAL_SQLI", "contains a disallowed SQL pattern"),
    };
    let field_errors: FieldErrors = hits
        .iter()
        .map(|path| ((*path).clone(), message.to_string()))
        .collect();
    let events = hits
        .iter()
        .map(|path| {
            let field = (*path).clone();
            match detector {
                Detector::Xss => SecurityEvent::XssDetected { field },
                Detector::SqlInjection => SecurityEvent::SqlInjectionDetected { field },
            }
        })
        .collect();
    let internal = format!(
        "{} pattern in {}",
        if matches!(detector, Detector::Xss) { "XSS" } else { "SQL injection" },
        hits.iter().map(|p| p.as_str()).collect::<Vec<_>>().join(", ")
    );

    Err(Rejection {
        error: AppError::validation(code, internal, field_errors),
        events,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON: Option<&str> = Some("application/json");

    fn config() -> ValidationConfig {
        ValidationConfig::default()
    }

    fn code_of(rejection: &Rejection) -> &str {
        &rejection.error.detail().code
    }

    #[test]
    fn test_oversized_body_rejected_before_parsing() {
        let config = ValidationConfig {
            max_request_size_bytes: 8,
            ..config()
        };
        // Not JSON at all: the size check must fire before the parser sees it.
        let body = vec![b'a'; 9];
        let rejection = validate_request(&config, JSON, None, &body).unwrap_err();

        assert_eq!(code_of(&rejection), "VAL_SIZE");
        assert!(rejection.error.detail().field_errors.contains_key("body"));
    }

    #[test]
    fn test_body_at_size_limit_is_accepted() {
        let config = ValidationConfig {
            max_request_size_bytes: 8,
            ..config()
        };
        let accepted = validate_request(&config, Some("text/plain"), None, b"aaaaaaaa").unwrap();
        assert_eq!(accepted.body, None);
    }

    #[test]
    fn test_unsupported_content_type() {
        let rejection =
            validate_request(&config(), Some("application/xml"), None, b"<a/>").unwrap_err();
        assert_eq!(code_of(&rejection), "VAL_CONTENT_TYPE");
        let message = &rejection.error.detail().field_errors["content_type"];
        assert!(message.contains("application/json"));
    }

    #[test]
    fn test_empty_body_skips_content_type() {
        assert!(validate_request(&config(), None, None, b"").is_ok());
    }

    #[test]
    fn test_content_type_parameters_ignored() {
        let accepted =
            validate_request(&config(), Some("Application/JSON; charset=utf-8"), None, b"{}");
        assert!(accepted.is_ok());
    }

    #[test]
    fn test_malformed_json() {
        let rejection = validate_request(&config(), JSON, None, b"{\"a\":").unwrap_err();
        assert_eq!(code_of(&rejection), "VAL_MALFORMED");
    }

    #[test]
    fn test_xss_names_field_and_records_event() {
        let body = br#"{"name": "<script>alert(1)</script>", "ok": "fine"}"#;
        let rejection = validate_request(&config(), JSON, None, body).unwrap_err();

        assert_eq!(code_of(&rejection), "VAL_XSS");
        let fields: Vec<_> = rejection.error.detail().field_errors.keys().collect();
        assert_eq!(fields, vec!["name"]);
        assert_eq!(
            rejection.events,
            vec![SecurityEvent::XssDetected {
                field: "name".to_string()
            }]
        );
    }

    #[test]
    fn test_xss_disabled_falls_through_to_sanitizer() {
        let config = ValidationConfig {
            enable_xss_protection: false,
            ..config()
        };
        let body = br#"{"name": "<script>alert(1)</script>Ann"}"#;
        let accepted = validate_request(&config, JSON, None, body).unwrap();

        let value: Value = serde_json::from_slice(&accepted.body.unwrap()).unwrap();
        assert_eq!(value["name"], "Ann");
        assert_eq!(accepted.sanitized_fields, 1);
    }

    #[test]
    fn test_markup_in_object_key_is_rejected() {
        let body = br#"{"profile": {"<script>alert(1)</script>": "x"}}"#;
        let rejection = validate_request(&config(), JSON, None, body).unwrap_err();

        assert_eq!(code_of(&rejection), "VAL_XSS");
        let fields: Vec<_> = rejection.error.detail().field_errors.keys().collect();
        assert_eq!(fields, vec!["profile#key"]);
        assert!(!rejection.error.detail().internal.contains("alert"));
    }

    #[test]
    fn test_sql_in_form_field_name_is_rejected() {
        let rejection = validate_request(
            &config(),
            Some("application/x-www-form-urlencoded"),
            None,
            b"x%27%20OR%201%3D1=1",
        )
        .unwrap_err();

        assert_eq!(code_of(&rejection), "VAL_SQLI");
        assert!(rejection.error.detail().field_errors.contains_key("body#key"));
    }

    #[test]
    fn test_object_keys_are_sanitized() {
        let body = br#"{"<b>title</b>": "Hello", "n": 1}"#;
        let accepted = validate_request(&config(), JSON, None, body).unwrap();

        let value: Value = serde_json::from_slice(&accepted.body.unwrap()).unwrap();
        assert_eq!(value, serde_json::json!({"title": "Hello", "n": 1}));
        assert_eq!(accepted.sanitized_fields, 1);
    }

    #[test]
    fn test_sql_injection_in_query_params() {
        let rejection = validate_request(
            &config(),
            None,
            Some("q=1%27%20OR%201%3D1&page=2"),
            b"",
        )
        .unwrap_err();

        assert_eq!(code_of(&rejection), "VAL_SQLI");
        assert!(rejection.error.detail().field_errors.contains_key("query.q"));
        assert_eq!(
            rejection.events,
            vec![SecurityEvent::SqlInjectionDetected {
                field: "query.q".to_string()
            }]
        );
    }

    #[test]
    fn test_sql_injection_nested_path() {
        let body = br#"{"filters": [{"value": "x' UNION SELECT password FROM users"}]}"#;
        let rejection = validate_request(&config(), JSON, None, body).unwrap_err();

        assert_eq!(code_of(&rejection), "VAL_SQLI");
        assert!(
            rejection
                .error
                .detail()
                .field_errors
                .contains_key("filters[0].value")
        );
    }

    #[test]
    fn test_legitimate_payload_passes_unchanged() {
        let body = br#"{"company": "Acme Media", "note": "Please select your plan", "n": 3}"#;
        let accepted = validate_request(&config(), JSON, None, body).unwrap();
        assert_eq!(accepted, Validated::default());
    }

    #[test]
    fn test_form_body_is_sanitized_and_reencoded() {
        let accepted = validate_request(
            &config(),
            Some("application/x-www-form-urlencoded"),
            None,
            b"name=%3Cb%3EAnn%3C%2Fb%3E&age=3",
        )
        .unwrap();

        let body = String::from_utf8(accepted.body.unwrap()).unwrap();
        let pairs: Vec<(String, String)> = url::form_urlencoded::parse(body.as_bytes())
            .into_owned()
            .collect();
        assert!(pairs.contains(&("name".to_string(), "Ann".to_string())));
        assert!(pairs.contains(&("age".to_string(), "3".to_string())));
    }

    #[test]
    fn test_truncation_rewrites_body() {
        let config = ValidationConfig {
            max_string_length: 3,
            ..config()
        };
        let accepted = validate_request(&config, JSON, None, br#"{"a": "abcdef"}"#).unwrap();

        assert_eq!(accepted.truncated_fields, vec!["a".to_string()]);
        assert_eq!(accepted.body.unwrap(), br#"{"a":"abc"}"#.to_vec());
    }

    #[test]
    fn test_depth_violation_maps_to_field_error() {
        let config = ValidationConfig {
            max_json_depth: 2,
            ..config()
        };
        let rejection =
            validate_request(&config, JSON, None, br#"{"a": {"b": {"c": 1}}}"#).unwrap_err();

        assert_eq!(code_of(&rejection), "VAL_DEPTH");
        assert!(rejection.error.detail().field_errors.contains_key("a.b"));
    }
}
