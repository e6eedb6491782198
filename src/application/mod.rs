//! Application layer: the decisions behind the auth and rate-limit stages.
//!
//! Services here talk to the shared store and the identity resolver through
//! their traits and know nothing about HTTP.
//!
//! # Available Services
//!
//! - [`services::auth_service::TokenVerifier`] - bearer credential verification and revocation
//! - [`services::rate_limit_service::RateLimiter`] - fixed-window admission control

pub mod services;
