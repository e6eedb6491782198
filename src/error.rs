//! Typed error taxonomy and the canonical error envelope.
//!
//! Every failure that reaches a caller is an [`AppError`]. The variant set is
//! closed: anything not raised as a typed error (an `anyhow` error bubbling out
//! of a handler, a panic) is folded into [`AppError::Unclassified`].
//!
//! # Wire format
//!
//! ```json
//! {
//!   "error": {
//!     "code": "VAL_XSS",
//!     "user_message": "Please check your input and try again",
//!     "details": { "name": "contains a disallowed script pattern" },
//!     "request_id": "6f0e1c7e-...",
//!     "timestamp": "2026-01-05T10:30:00.000Z"
//!   }
//! }
//! ```
//!
//! `message` (internal detail) and `trace` only appear when debug mode is on.

use std::any::Any;
use std::collections::BTreeMap;

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Field name to message mapping carried by validation failures.
pub type FieldErrors = BTreeMap<String, String>;

/// Payload shared by every [`AppError`] variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetail {
    /// Stable short identifier, e.g. `AUTH_001`.
    pub code: String,
    /// Free text for logs. Never shown to callers outside debug mode.
    pub internal: String,
    /// Safe to display.
    pub user_message: String,
    pub field_errors: FieldErrors,
    /// Extended diagnostics (error chain, panic payload); debug mode only.
    pub trace: Option<String>,
}

impl ErrorDetail {
    fn new(code: &str, internal: impl Into<String>, user_message: &str) -> Self {
        Self {
            code: code.to_string(),
            internal: internal.into(),
            user_message: user_message.to_string(),
            field_errors: FieldErrors::new(),
            trace: None,
        }
    }
}

/// Closed set of pipeline errors.
///
/// | Variant | Status | Default code |
/// |---|---|---|
/// | `Authentication` | 401 | `AUTH_001` |
/// | `Authorization` | 403 | `AUTH_002` |
/// | `Validation` | 422 | `VAL_001` |
/// | `RateLimit` | 429 | `RATE_001` |
/// | `Upstream` | 503 | `EXT_001` |
/// | `DataStore` | 500 | `DB_001` |
/// | `BusinessRule` | 400 | `BIZ_001` |
/// | `Unclassified` | 500 | `SYS_001` |
#[derive(Debug, Clone, thiserror::Error)]
pub enum AppError {
    #[error("authentication error [{}]: {}", .0.code, .0.internal)]
    Authentication(ErrorDetail),
    #[error("authorization error [{}]: {}", .0.code, .0.internal)]
    Authorization(ErrorDetail),
    #[error("validation error [{}]: {}", .0.code, .0.internal)]
    Validation(ErrorDetail),
    #[error("rate limit error [{}]: {} (retry after {retry_after}s)", .detail.code, .detail.internal)]
    RateLimit {
        detail: ErrorDetail,
        retry_after: u64,
    },
    #[error("upstream service error [{}]: {}", .0.code, .0.internal)]
    Upstream(ErrorDetail),
    #[error("data store error [{}]: {}", .0.code, .0.internal)]
    DataStore(ErrorDetail),
    #[error("business rule error [{}]: {}", .0.code, .0.internal)]
    BusinessRule(ErrorDetail),
    #[error("unclassified error [{}]: {}", .0.code, .0.internal)]
    Unclassified(ErrorDetail),
}

pub const GENERIC_INTERNAL_MESSAGE: &str = "An unexpected error occurred. Please try again later";
const VALIDATION_MESSAGE: &str = "Please check your input and try again";
const AUTHENTICATION_MESSAGE: &str = "Please log in to access this resource";

impl AppError {
    /// Missing, malformed, expired or otherwise unverifiable credential.
    pub fn authentication(internal: impl Into<String>) -> Self {
        Self::Authentication(ErrorDetail::new(
            "AUTH_001",
            internal,
            AUTHENTICATION_MESSAGE,
        ))
    }

    /// Structurally valid credential whose identifier is on the revocation list.
    pub fn revoked_credential(internal: impl Into<String>) -> Self {
        Self::Authentication(ErrorDetail::new(
            "AUTH_003",
            internal,
            AUTHENTICATION_MESSAGE,
        ))
    }

    pub fn authorization(internal: impl Into<String>) -> Self {
        Self::Authorization(ErrorDetail::new(
            "AUTH_002",
            internal,
            "You don't have permission to access this resource",
        ))
    }

    /// Caller identity on the rate-limit blacklist.
    pub fn blocked(internal: impl Into<String>) -> Self {
        Self::authorization(internal)
            .with_code("RATE_002")
            .with_user_message("Access from this client has been blocked")
    }

    /// Validation failure with a specific code (`VAL_SIZE`, `VAL_XSS`, ...).
    pub fn validation(code: &str, internal: impl Into<String>, field_errors: FieldErrors) -> Self {
        let mut detail = ErrorDetail::new(code, internal, VALIDATION_MESSAGE);
        detail.field_errors = field_errors;
        Self::Validation(detail)
    }

    /// Validation failure pinned to a single field.
    pub fn invalid_field(
        code: &str,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let field = field.into();
        let message = message.into();
        let internal = format!("{field}: {message}");
        Self::validation(code, internal, FieldErrors::from([(field, message)]))
    }

    pub fn rate_limited(retry_after: u64) -> Self {
        Self::RateLimit {
            detail: ErrorDetail::new(
                "RATE_001",
                "Rate limit exceeded",
                "Too many requests. Please try again later",
            ),
            retry_after,
        }
    }

    pub fn upstream(internal: impl Into<String>) -> Self {
        Self::Upstream(ErrorDetail::new(
            "EXT_001",
            internal,
            "External service is temporarily unavailable",
        ))
    }

    pub fn data_store(internal: impl Into<String>) -> Self {
        Self::DataStore(ErrorDetail::new(
            "DB_001",
            internal,
            "A database error occurred. Please try again",
        ))
    }

    pub fn business_rule(internal: impl Into<String>, user_message: impl Into<String>) -> Self {
        let mut detail = ErrorDetail::new(
            "BIZ_001",
            internal,
            "Operation cannot be completed due to business rules",
        );
        detail.user_message = user_message.into();
        Self::BusinessRule(detail)
    }

    pub fn unclassified(internal: impl Into<String>) -> Self {
        Self::Unclassified(ErrorDetail::new(
            "SYS_001",
            internal,
            GENERIC_INTERNAL_MESSAGE,
        ))
    }

    /// Builds an [`AppError::Unclassified`] from a caught panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send + 'static>) -> Self {
        let message = panic_message(payload.as_ref());
        let mut err = Self::unclassified(format!("panic: {message}"));
        err.detail_mut().trace = Some(message);
        err
    }

    /// Replaces the stable code.
    pub fn with_code(mut self, code: &str) -> Self {
        self.detail_mut().code = code.to_string();
        self
    }

    pub fn with_user_message(mut self, user_message: impl Into<String>) -> Self {
        self.detail_mut().user_message = user_message.into();
        self
    }

    pub fn detail(&self) -> &ErrorDetail {
        match self {
            Self::Authentication(d)
            | Self::Authorization(d)
            | Self::Validation(d)
            | Self::Upstream(d)
            | Self::DataStore(d)
            | Self::BusinessRule(d)
            | Self::Unclassified(d) => d,
            Self::RateLimit { detail, .. } => detail,
        }
    }

    fn detail_mut(&mut self) -> &mut ErrorDetail {
        match self {
            Self::Authentication(d)
            | Self::Authorization(d)
            | Self::Validation(d)
            | Self::Upstream(d)
            | Self::DataStore(d)
            | Self::BusinessRule(d)
            | Self::Unclassified(d) => d,
            Self::RateLimit { detail, .. } => detail,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::Authorization(_) => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::RateLimit { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::DataStore(_) | Self::Unclassified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BusinessRule(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Short variant name used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "authentication",
            Self::Authorization(_) => "authorization",
            Self::Validation(_) => "validation",
            Self::RateLimit { .. } => "rate_limit",
            Self::Upstream(_) => "upstream_service",
            Self::DataStore(_) => "data_store",
            Self::BusinessRule(_) => "business_rule",
            Self::Unclassified(_) => "unclassified",
        }
    }

    /// Renders the canonical envelope for a given correlation id.
    ///
    /// With `debug` set, the internal detail and trace are included.
    pub fn render(&self, request_id: &str, debug: bool) -> Response {
        let detail = self.detail();
        let body = ErrorEnvelope {
            error: ErrorBody {
                code: detail.code.clone(),
                message: debug.then(|| detail.internal.clone()),
                user_message: detail.user_message.clone(),
                details: detail.field_errors.clone(),
                request_id: request_id.to_string(),
                timestamp: now_rfc3339(),
                trace: if debug { detail.trace.clone() } else { None },
            },
        };

        let mut response = (self.status(), Json(body)).into_response();
        let headers = response.headers_mut();
        match self {
            Self::Authentication(_) => {
                headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            }
            Self::RateLimit { retry_after, .. } => {
                headers.insert(header::RETRY_AFTER, HeaderValue::from(*retry_after));
            }
            _ => {}
        }
        response
    }
}

impl IntoResponse for AppError {
    /// Renders a standalone envelope and keeps the typed error in the
    /// response extensions, where the error-handler stage picks it up to
    /// re-render with the request's correlation id.
    fn into_response(self) -> Response {
        let mut response = self.render(&Uuid::new_v4().to_string(), false);
        response.extensions_mut().insert(self);
        response
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        let mut app = Self::unclassified(format!("{err:#}"));
        app.detail_mut().trace = Some(format!("{err:?}"));
        app
    }
}

/// Canonical error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub user_message: String,
    #[serde(default)]
    pub details: FieldErrors,
    pub request_id: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

/// ISO-8601 UTC timestamp with millisecond precision.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Extracts a readable message from a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
