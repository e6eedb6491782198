//! # Request Guard
//!
//! A request-processing pipeline for Axum services. Every request passes,
//! in a fixed order:
//!
//! 1. **Error handler** - correlation id, uniform JSON error envelope
//! 2. **Request logger** - timing plus request, performance, security and
//!    analytics records
//! 3. **Authentication** - HS256 bearer tokens with a revocation list
//! 4. **Rate limiter** - fixed windows in a shared counter store
//! 5. **Validator** - size, structure, XSS/SQL injection checks, sanitization
//!
//! ## Architecture
//!
//! - **Domain Layer** ([`domain`]) - Request context, identities, log records
//! - **Application Layer** ([`application`]) - Token verification and rate limiting
//! - **Infrastructure Layer** ([`infrastructure`]) - Counter stores, log sinks
//! - **Validation** ([`validation`]) - Pure request-body checks
//! - **API Layer** ([`api`]) - Pipeline stages, handlers, DTOs
//!
//! ## Quick Start
//!
//! ```bash
//! export JWT_SECRET="change-me"
//! export REDIS_URL="redis://localhost:6379"  # Optional for a single instance
//!
//! cargo run
//! ```
//!
//! ## Configuration
//!
//! Service configuration is loaded from environment variables via [`config::Config`].
//! See [`config`] module for available options.

pub mod api;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod state;
pub mod utils;
pub mod validation;

pub mod routes;
pub mod server;

pub use error::AppError;
pub use state::AppState;

/// Commonly used types for external consumers.
///
/// Re-exports frequently used types to simplify imports for library users
/// and integration tests.
pub mod prelude {
    pub use crate::api::middleware::{Pipeline, Stage};
    pub use crate::application::services::{RateLimiter, TokenVerifier};
    pub use crate::config::Config;
    pub use crate::domain::context::{RequestContext, SecurityEvent};
    pub use crate::domain::identity::{Claims, Identity};
    pub use crate::error::{AppError, ErrorEnvelope};
    pub use crate::routes::{app_router, protect};
    pub use crate::state::AppState;
}
