//! Sink decorator that strips sensitive fields.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

use super::service::LogSink;
use crate::domain::log_record::LogRecord;
use crate::utils::redact::redact;

/// Redacts every record before handing it to the wrapped sink.
///
/// Applies to all categories alike; the denylist holds lowercase key names.
pub struct RedactingSink {
    inner: Arc<dyn LogSink>,
    sensitive: HashSet<String>,
}

impl RedactingSink {
    pub fn new(inner: Arc<dyn LogSink>, sensitive: HashSet<String>) -> Self {
        let sensitive = sensitive.iter().map(|s| s.to_ascii_lowercase()).collect();
        Self { inner, sensitive }
    }
}

#[async_trait]
impl LogSink for RedactingSink {
    async fn emit(&self, mut record: LogRecord) {
        let mut fields = Value::Object(std::mem::take(&mut record.fields));
        redact(&mut fields, &self.sensitive);
        if let Value::Object(map) = fields {
            record.fields = map;
        }
        self.inner.emit(record).await;
    }
}
