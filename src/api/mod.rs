//! HTTP layer: the request pipeline and the endpoints served behind it.
//!
//! # Modules
//!
//! - [`middleware`] - The pipeline stages and their composition
//! - [`handlers`] - HTTP request handlers
//! - [`dto`] - Response bodies
//! - [`routes`] - Route configuration

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod routes;
