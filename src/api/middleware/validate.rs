//! Innermost stage: request body and query validation.

use async_trait::async_trait;
use axum::{
    body::{Body, to_bytes},
    extract::Request,
    http::{HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::{Stage, context_of, declared_length};
use crate::config::ValidationConfig;
use crate::domain::log_record::LogCategory;
use crate::validation::engine::{size_error, validate_request};

/// Buffers the body (bounded by the size limit), runs the validation
/// engine and hands the handler the accepted, possibly rewritten, body.
///
/// Oversized requests are refused from `Content-Length` before any byte is
/// read. Truncation and sanitization counts are added to the request log.
pub struct ValidateStage {
    config: ValidationConfig,
}

impl ValidateStage {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Stage for ValidateStage {
    fn name(&self) -> &'static str {
        "validate"
    }

    async fn process(&self, mut req: Request, next: Next) -> Response {
        let ctx = context_of(&mut req);
        let limit = self.config.max_request_size_bytes;

        if declared_length(&req).is_some_and(|len| len > limit as u64) {
            return size_error(limit).into_response();
        }

        let (mut parts, body) = req.into_parts();
        let bytes = match to_bytes(body, limit).await {
            Ok(bytes) => bytes,
            Err(_) => return size_error(limit).into_response(),
        };

        let content_type = parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());
        let outcome = validate_request(&self.config, content_type, parts.uri.query(), &bytes);

        let validated = match outcome {
            Ok(validated) => validated,
            Err(rejection) => {
                for event in rejection.events {
                    ctx.record_security_event(event);
                }
                return rejection.error.into_response();
            }
        };

        if !validated.truncated_fields.is_empty() {
            ctx.add_field(
                LogCategory::Request,
                "truncated_fields",
                validated.truncated_fields.clone(),
            );
        }
        if validated.sanitized_fields > 0 {
            ctx.add_field(
                LogCategory::Request,
                "sanitized_fields",
                validated.sanitized_fields as u64,
            );
        }

        let body = match validated.body {
            Some(rewritten) => {
                parts
                    .headers
                    .insert(header::CONTENT_LENGTH, HeaderValue::from(rewritten.len()));
                Body::from(rewritten)
            }
            None => Body::from(bytes),
        };
        next.run(Request::from_parts(parts, body)).await
    }
}
