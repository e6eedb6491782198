//! Request body validation and sanitization.
//!
//! Pure functions over already-read request bytes; no I/O happens here.
//! The [`crate::api::middleware::validate`] stage feeds them.
//!
//! # Modules
//!
//! - [`engine`] - request-level entry point: size, content type, parse, checks, re-encode
//! - [`structure`] - depth / array length / string length walk over a parsed value
//! - [`patterns`] - XSS and SQL-injection detectors
//! - [`sanitize`] - idempotent HTML stripping and escaping
//!
//! # Order of checks
//!
//! 1. Size (before any parsing)
//! 2. Content type
//! 3. Parse into a [`serde_json::Value`]
//! 4. Structure (hard failures for depth and arrays, truncation for strings)
//! 5. XSS detection, then SQL-injection detection (reject, never repair)
//! 6. Sanitization of what is left

pub mod engine;
pub mod patterns;
pub mod sanitize;
pub mod structure;

pub use engine::{Rejection, Validated, validate_request};
