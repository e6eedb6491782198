//! Top-level router configuration.
//!
//! # Route Structure
//!
//! - `GET  /health`     - Store health (public by default)
//! - `GET  /api/me`     - Authenticated caller
//! - `POST /api/echo`   - Validated body echo
//!
//! # Middleware
//!
//! Every route, including unmatched ones, runs through the standard
//! [`Pipeline`]. Trailing slashes are trimmed before routing.

use crate::api;
use crate::api::handlers::health_handler;
use crate::api::middleware::Pipeline;
use crate::error::AppError;
use crate::state::AppState;
use axum::Router;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use std::any::Any;
use tower::Layer;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};

/// Wraps any router in the standard pipeline.
///
/// Use this to put your own routes behind the same error handling,
/// logging, auth, rate limiting and validation as the bundled ones.
pub fn protect<S>(routes: Router<S>, state: &AppState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let routes = routes.layer(CatchPanicLayer::custom(panic_response));
    Pipeline::standard(state).apply(routes)
}

fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    AppError::from_panic(payload).into_response()
}

/// The bundled routes behind the standard pipeline.
pub fn service_router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api::routes::api_routes())
        .with_state(state.clone());

    protect(routes, &state)
}

/// Constructs the application router with all routes and middleware.
pub fn app_router(state: AppState) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(service_router(state))
}
