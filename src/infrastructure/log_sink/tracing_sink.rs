//! Sink that forwards records to `tracing`.

use async_trait::async_trait;
use serde_json::Value;

use super::service::LogSink;
use crate::domain::log_record::{LogCategory, LogRecord, Severity};

/// Emits every record as a `tracing` event.
///
/// The category becomes the event target (`request`, `performance`,
/// `security`, `analytics`, `error`), so `RUST_LOG=security=warn` style
/// filters work per category. Record fields are attached as one JSON field.
///
/// # Example Logs
///
/// ```text
/// INFO request: Request completed fields={"method":"POST","path":"/api/echo","status":200,...}
/// WARN security: Security events detected fields={"events":[{"event":"xss_detected","field":"name"}],...}
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TracingSink {
    pub fn new() -> Self {
        Self
    }
}

macro_rules! emit_at {
    ($target:literal, $severity:expr, $message:expr, $fields:expr) => {
        match $severity {
            Severity::Debug => tracing::debug!(target: $target, fields = %$fields, "{}", $message),
            Severity::Info => tracing::info!(target: $target, fields = %$fields, "{}", $message),
            Severity::Warn => tracing::warn!(target: $target, fields = %$fields, "{}", $message),
            Severity::Error => tracing::error!(target: $target, fields = %$fields, "{}", $message),
        }
    };
}

#[async_trait]
impl LogSink for TracingSink {
    async fn emit(&self, record: LogRecord) {
        let fields = Value::Object(record.fields);
        let message = record.message;
        match record.category {
            LogCategory::Request => emit_at!("request", record.severity, message, fields),
            LogCategory::Performance => emit_at!("performance", record.severity, message, fields),
            LogCategory::Security => emit_at!("security", record.severity, message, fields),
            LogCategory::Analytics => emit_at!("analytics", record.severity, message, fields),
            LogCategory::Error => emit_at!("error", record.severity, message, fields),
        }
    }
}
