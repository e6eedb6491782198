//! Helpers shared by the pipeline stages.
//!
//! - [`client_ip`] - client address from the peer socket or proxy headers
//! - [`redact`] - sensitive-field redaction for log records
//! - [`endpoint`] - endpoint normalization and API version for analytics

pub mod client_ip;
pub mod endpoint;
pub mod redact;
