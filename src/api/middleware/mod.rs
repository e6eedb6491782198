//! The request-processing pipeline.
//!
//! Every request passes the stages in this order, outermost first:
//!
//! 1. [`error_handler`] - creates the request context, turns every failure into the error envelope
//! 2. [`request_log`] - timing and category records
//! 3. [`auth`] - bearer credential verification
//! 4. [`rate_limit`] - fixed-window admission control
//! 5. [`validate`] - size, structure, injection checks and sanitization
//!
//! A stage either calls `next` or answers on its own. Stages never reorder;
//! on the way back out they see the response in reverse order.

pub mod auth;
pub mod error_handler;
pub mod rate_limit;
pub mod request_log;
pub mod validate;

use async_trait::async_trait;
use axum::{
    Router,
    body::HttpBody,
    extract::Request,
    http::header,
    middleware::{self, Next},
    response::Response,
};
use std::sync::Arc;

use crate::domain::context::RequestContext;
use crate::state::AppState;

pub use auth::AuthStage;
pub use error_handler::ErrorHandlerStage;
pub use rate_limit::RateLimitStage;
pub use request_log::RequestLogStage;
pub use validate::ValidateStage;

/// One step of the pipeline.
#[async_trait]
pub trait Stage: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Handles `req`, usually by awaiting `next.run(req)` in between its own
    /// work.
    async fn process(&self, req: Request, next: Next) -> Response;
}

/// Wraps `router` in `stages`. The first stage in the list is the outermost.
pub fn compose<S>(router: Router<S>, stages: Vec<Arc<dyn Stage>>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    stages.into_iter().rev().fold(router, |router, stage| {
        router.layer(middleware::from_fn(move |req: Request, next: Next| {
            let stage = stage.clone();
            async move { stage.process(req, next).await }
        }))
    })
}

/// Returns the request context, creating and storing one when no outer
/// stage did. Lets a stage run on its own in tests.
pub(crate) fn context_of(req: &mut Request) -> Arc<RequestContext> {
    match RequestContext::from_request(req) {
        Some(ctx) => ctx,
        None => {
            let ctx = Arc::new(RequestContext::new());
            req.extensions_mut().insert(ctx.clone());
            ctx
        }
    }
}

/// Declared body length: `Content-Length`, or the body's exact size hint
/// when the header is absent.
pub(crate) fn declared_length(req: &Request) -> Option<u64> {
    req.headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .or_else(|| req.body().size_hint().exact())
}

/// An ordered list of stages.
#[derive(Clone)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Error handler, logger, auth, rate limiter, validator.
    pub fn standard(state: &AppState) -> Self {
        let config = &state.config;
        Self::new()
            .stage(ErrorHandlerStage::new(state.sink.clone(), config.debug))
            .stage(RequestLogStage::new(
                state.sink.clone(),
                config.logging.clone(),
            ))
            .stage(AuthStage::new(state.verifier.clone(), config.auth.clone()))
            .stage(RateLimitStage::new(
                state.limiter.clone(),
                config.rate_limit.behind_proxy,
            ))
            .stage(ValidateStage::new(config.validation.clone()))
    }

    /// Appends a stage inside the ones already added.
    pub fn stage(mut self, stage: impl Stage) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn apply<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        compose(router, self.stages)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
