//! API route configuration.
//!
//! Whether a route needs a credential is decided by the auth stage from
//! `PUBLIC_PATHS`, not here.

use crate::api::handlers::{echo_handler, me_handler};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};

/// Demo endpoints that expose what the pipeline attached to a request.
///
/// # Endpoints
///
/// - `GET  /me`   - Identity, credential id and request id
/// - `POST /echo` - Returns the validated body
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(me_handler))
        .route("/echo", post(echo_handler))
}
