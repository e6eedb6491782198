//! Domain layer: per-request state and the contracts the pipeline consumes.
//!
//! # Architecture
//!
//! - [`context`] - [`context::RequestContext`], created once per request at pipeline entry
//! - [`identity`] - verified credential claims, caller identity and the resolver contract
//! - [`log_record`] - category-tagged structured log records
//!
//! # Design Principles
//!
//! - No dependency on infrastructure or presentation layers
//! - External collaborators (identity resolution, shared store, log sink) are traits;
//!   concrete implementations live in [`crate::infrastructure`]

pub mod context;
pub mod identity;
pub mod log_record;
