//! Log sink trait.

use async_trait::async_trait;

use crate::domain::log_record::LogRecord;

/// Accepts structured records from the pipeline.
///
/// Implementations must not fail the request: delivery problems are theirs
/// to swallow. Wrap a sink in [`super::RedactingSink`] to strip sensitive
/// fields first.
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn emit(&self, record: LogRecord);
}
