//! Infrastructure layer for external integrations.
//!
//! This layer implements the collaborators the pipeline consumes, providing
//! concrete implementations for the shared store, log delivery and identity
//! resolution.
//!
//! # Modules
//!
//! - [`store`] - Shared counter store (Redis and in-memory implementations)
//! - [`log_sink`] - Structured log sinks (tracing and in-memory implementations)
//! - [`identity`] - Claims-based [`crate::domain::identity::IdentityResolver`]

pub mod identity;
pub mod log_sink;
pub mod store;
