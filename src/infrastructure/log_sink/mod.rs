//! Destinations for category-tagged log records.
//!
//! - [`TracingSink`] - forwards records to `tracing`, one target per category
//! - [`MemorySink`] - keeps records in memory for assertions in tests
//! - [`RedactingSink`] - replaces sensitive fields before forwarding to another sink

mod memory_sink;
mod redacting_sink;
mod service;
mod tracing_sink;

pub use memory_sink::MemorySink;
pub use redacting_sink::RedactingSink;
pub use service::LogSink;
pub use tracing_sink::TracingSink;
