//! Handlers that reflect what the pipeline did to a request.

use axum::{Extension, Json};
use serde_json::Value;
use std::sync::Arc;

use crate::api::dto::me::MeResponse;
use crate::domain::context::RequestContext;
use crate::error::AppError;

/// `GET /api/me`: the identity the auth stage attached.
///
/// Public routes can reach this without an identity, in which case the
/// caller gets `401`.
pub async fn me_handler(
    Extension(ctx): Extension<Arc<RequestContext>>,
) -> Result<Json<MeResponse>, AppError> {
    let identity = ctx
        .identity()
        .ok_or_else(|| AppError::authentication("no identity attached to request"))?;

    Ok(Json(MeResponse {
        user_id: identity.user_id.clone(),
        request_id: ctx.request_id().to_string(),
        credential_id: ctx.credential_id().map(str::to_string),
    }))
}

/// `POST /api/echo`: returns the body after validation, truncation and
/// sanitization.
pub async fn echo_handler(Json(body): Json<Value>) -> Json<Value> {
    Json(body)
}
