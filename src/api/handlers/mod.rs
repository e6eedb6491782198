//! HTTP request handlers for the demo endpoints served behind the pipeline.

pub mod echo;
pub mod health;

pub use echo::{echo_handler, me_handler};
pub use health::health_handler;
