//! Per-identity rate limiting stage.

use async_trait::async_trait;
use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::{Stage, context_of};
use crate::application::services::{Decision, RateLimiter};
use crate::domain::context::SecurityEvent;
use crate::error::AppError;
use crate::utils::client_ip::ip_identity;

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Fixed-window throttle keyed by caller.
///
/// # Identity
///
/// - `user:<id>` when the auth stage attached an identity
/// - `ip:<addr>` otherwise; proxy headers are only read when `behind_proxy`
///
/// # Responses
///
/// - Admitted: `X-RateLimit-Limit` and `X-RateLimit-Remaining` are added
/// - Over any window: `429` with `Retry-After` set to what is left of the
///   longest exceeded window; inner stages and the handler never run
/// - Blacklisted identity or peer address: `403` before anything is counted
/// - Store unreachable: the request is admitted without headers
pub struct RateLimitStage {
    limiter: Arc<RateLimiter>,
    behind_proxy: bool,
}

impl RateLimitStage {
    pub fn new(limiter: Arc<RateLimiter>, behind_proxy: bool) -> Self {
        Self {
            limiter,
            behind_proxy,
        }
    }
}

fn set_limit_headers(headers: &mut HeaderMap, limit: u64, remaining: u64) {
    headers.insert(LIMIT_HEADER, HeaderValue::from(limit));
    headers.insert(REMAINING_HEADER, HeaderValue::from(remaining));
}

#[async_trait]
impl Stage for RateLimitStage {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    async fn process(&self, mut req: Request, next: Next) -> Response {
        let ctx = context_of(&mut req);
        let peer = ip_identity(&req, self.behind_proxy);
        let identity = match ctx.identity() {
            Some(identity) => format!("user:{}", identity.user_id),
            None => peer.clone(),
        };

        let decision = if self.limiter.is_blacklisted(&peer) {
            Decision::Blocked
        } else {
            self.limiter.check(&identity).await
        };

        match decision {
            Decision::Allowed { limit, remaining } => {
                let mut response = next.run(req).await;
                set_limit_headers(response.headers_mut(), limit, remaining);
                response
            }
            Decision::Limited {
                window,
                count,
                limit,
                retry_after,
            } => {
                metrics::counter!("rate_limit_rejections_total", "window" => window).increment(1);
                ctx.record_security_event(SecurityEvent::RateLimitExceeded {
                    identity,
                    count,
                    limit,
                });
                let mut response = AppError::rate_limited(retry_after).into_response();
                set_limit_headers(response.headers_mut(), limit, 0);
                response
            }
            Decision::Blocked => {
                let blocked = if self.limiter.is_blacklisted(&peer) {
                    peer
                } else {
                    identity
                };
                metrics::counter!("rate_limit_blocked_total").increment(1);
                ctx.record_security_event(SecurityEvent::BlockedIdentity {
                    identity: blocked.clone(),
                });
                AppError::blocked(format!("{blocked} is blacklisted")).into_response()
            }
            Decision::Bypassed | Decision::Degraded => next.run(req).await,
        }
    }
}
