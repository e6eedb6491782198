//! Bearer credential stage.

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_auth::AuthBearer;
use serde_json::json;
use std::sync::Arc;

use super::{Stage, context_of};
use crate::application::services::TokenVerifier;
use crate::config::AuthConfig;
use crate::domain::context::RequestContext;
use crate::domain::log_record::LogCategory;
use crate::error::AppError;

/// Authenticates requests using Bearer tokens from the Authorization header.
///
/// # Header Format
///
/// ```text
/// Authorization: Bearer <token>
/// ```
///
/// # Flow
///
/// 1. No header: public paths pass through anonymously, everything else
///    gets `401`
/// 2. Header present (public path or not): the credential is verified by
///    [`TokenVerifier`]; any failure short-circuits
/// 3. On success the identity is attached to the request context
///
/// Every verification outcome is added to the request record as `auth`.
/// Failures carrying a security event (bad signature, revoked credential,
/// inactive identity) also record it on the context for the logger.
pub struct AuthStage {
    verifier: Arc<TokenVerifier>,
    config: AuthConfig,
}

impl AuthStage {
    pub fn new(verifier: Arc<TokenVerifier>, config: AuthConfig) -> Self {
        Self { verifier, config }
    }
}

#[async_trait]
impl Stage for AuthStage {
    fn name(&self) -> &'static str {
        "auth"
    }

    async fn process(&self, mut req: Request, next: Next) -> Response {
        let ctx = context_of(&mut req);
        let public = self.config.is_public(req.uri().path());

        if !req.headers().contains_key(header::AUTHORIZATION) {
            if public {
                return next.run(req).await;
            }
            return reject(&ctx, AppError::authentication("missing bearer credential"));
        }

        let (mut parts, body) = req.into_parts();
        let token = match AuthBearer::from_request_parts(&mut parts, &()).await {
            Ok(AuthBearer(token)) => token,
            Err(_) => {
                return reject(
                    &ctx,
                    AppError::authentication("authorization header is not a bearer credential"),
                );
            }
        };
        let req = Request::from_parts(parts, body);

        match self.verifier.verify(&token).await {
            Ok(verified) => {
                ctx.add_field(
                    LogCategory::Request,
                    "auth",
                    json!({
                        "outcome": "success",
                        "credential_id": verified.credential_id.as_str(),
                    }),
                );
                ctx.attach_identity(verified.identity, verified.credential_id);
                next.run(req).await
            }
            Err(rejection) => {
                if let Some(event) = rejection.event {
                    ctx.record_security_event(event);
                }
                reject(&ctx, rejection.error)
            }
        }
    }
}

fn reject(ctx: &RequestContext, error: AppError) -> Response {
    ctx.add_field(
        LogCategory::Request,
        "auth",
        json!({"outcome": "failure", "code": error.detail().code}),
    );
    error.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::middleware::Pipeline;
    use crate::domain::identity::Claims;
    use crate::infrastructure::identity::ClaimsIdentityResolver;
    use crate::infrastructure::store::MemoryStore;
    use axum::{
        Extension, Json, Router,
        http::{HeaderValue, StatusCode},
        routing::get,
    };
    use axum_test::TestServer;
    use chrono::Utc;
    use jsonwebtoken::{EncodingKey, Header, encode};

    const SECRET: &str = "stage-secret";

    fn token(sub: &str) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            exp: Utc::now().timestamp() as u64 + 600,
            iat: None,
            jti: None,
            token_type: None,
            active: None,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn server() -> TestServer {
        let config = AuthConfig {
            jwt_secret: SECRET.to_string(),
            leeway_seconds: 0,
            public_paths: vec!["/health".to_string()],
        };
        let verifier = Arc::new(TokenVerifier::new(
            &config,
            Arc::new(MemoryStore::new()),
            Arc::new(ClaimsIdentityResolver::new()),
        ));
        let whoami = |Extension(ctx): Extension<Arc<RequestContext>>| async move {
            ctx.identity()
                .map(|i| i.user_id.clone())
                .unwrap_or_else(|| "anonymous".to_string())
        };
        let outcome = |Extension(ctx): Extension<Arc<RequestContext>>| async move {
            Json(ctx.fields(LogCategory::Request)["auth"].clone())
        };
        let router = Router::new()
            .route("/health", get(whoami))
            .route("/api/me", get(whoami))
            .route("/api/outcome", get(outcome));
        let app = Pipeline::new()
            .stage(AuthStage::new(verifier, config))
            .apply(router);
        TestServer::new(app).unwrap()
    }

    #[tokio::test]
    async fn test_missing_credential_rejected() {
        let response = server().get("/api/me").expect_failure().await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(response.header(header::WWW_AUTHENTICATE), "Bearer");
    }

    #[tokio::test]
    async fn test_valid_credential_attaches_identity() {
        let response = server()
            .get("/api/me")
            .authorization_bearer(token("42"))
            .await;
        response.assert_status_ok();
        response.assert_text("42");
    }

    #[tokio::test]
    async fn test_public_path_allows_anonymous() {
        let response = server().get("/health").await;
        response.assert_status_ok();
        response.assert_text("anonymous");
    }

    #[tokio::test]
    async fn test_public_path_still_verifies_present_credential() {
        let response = server()
            .get("/health")
            .authorization_bearer("garbage")
            .expect_failure()
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_non_bearer_scheme_rejected() {
        let response = server()
            .get("/api/me")
            .add_header(
                header::AUTHORIZATION,
                HeaderValue::from_static("Basic dXNlcjpwYXNz"),
            )
            .expect_failure()
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_success_outcome_is_recorded() {
        let response = server()
            .get("/api/outcome")
            .authorization_bearer(token("42"))
            .await;
        response.assert_status_ok();
        let auth: serde_json::Value = response.json();
        assert_eq!(auth["outcome"], "success");
        assert_eq!(auth["credential_id"].as_str().unwrap().len(), 64);
    }
}
