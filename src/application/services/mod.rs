//! Services used by the pipeline stages.

pub mod auth_service;
pub mod rate_limit_service;

pub use auth_service::{AuthRejection, TokenVerifier, Verified};
pub use rate_limit_service::{Decision, RateLimiter};
