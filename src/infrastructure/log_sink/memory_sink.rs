//! Sink that keeps records in memory.

use async_trait::async_trait;
use parking_lot::Mutex;

use super::service::LogSink;
use crate::domain::log_record::{LogCategory, LogRecord};

/// Collects records so tests can assert on what the pipeline logged.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    pub fn by_category(&self, category: LogCategory) -> Vec<LogRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.category == category)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

#[async_trait]
impl LogSink for MemorySink {
    async fn emit(&self, record: LogRecord) {
        self.records.lock().push(record);
    }
}
