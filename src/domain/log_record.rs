//! Structured log records emitted by the pipeline.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Log categories. Each maps to its own `tracing` target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogCategory {
    Request,
    Performance,
    Security,
    Analytics,
    Error,
}

impl LogCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Performance => "performance",
            Self::Security => "security",
            Self::Analytics => "analytics",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record severity, mapped onto `tracing` levels by the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

/// One structured record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub category: LogCategory,
    pub severity: Severity,
    pub message: String,
    pub fields: Map<String, Value>,
}

impl LogRecord {
    pub fn new(category: LogCategory, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            category,
            severity,
            message: message.into(),
            fields: Map::new(),
        }
    }

    /// Adds a field, builder style.
    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Merges every entry of `fields` into the record.
    pub fn extend(mut self, fields: Map<String, Value>) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}
