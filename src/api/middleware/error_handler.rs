//! Outermost stage: correlation ids and uniform error responses.

use async_trait::async_trait;
use axum::{
    Json,
    extract::Request,
    http::{HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use super::Stage;
use crate::domain::context::RequestContext;
use crate::domain::log_record::{LogCategory, LogRecord, Severity};
use crate::error::{AppError, ErrorBody, ErrorDetail, ErrorEnvelope, now_rfc3339};
use crate::infrastructure::log_sink::LogSink;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Log `kind` of client errors the router produced on its own (404, 405, ...).
pub const HTTP_ERROR_KIND: &str = "http";

/// Creates the [`RequestContext`] and guarantees that whatever happens
/// inside, the caller gets a response carrying its correlation id.
///
/// # Translation
///
/// - Typed errors (an [`AppError`] left in the response extensions) are
///   re-rendered with this request's id and the debug flag
/// - Panics that escaped every inner layer become [`AppError::Unclassified`]
/// - Bare framework errors (404, 405, extractor rejections) are wrapped
///   into the envelope with code `HTTP_<status>`, keeping their status
///
/// Every error is logged in the `error` category with its internal detail:
/// 5xx at error severity, 4xx at warning.
pub struct ErrorHandlerStage {
    sink: Arc<dyn LogSink>,
    debug: bool,
}

impl ErrorHandlerStage {
    pub fn new(sink: Arc<dyn LogSink>, debug: bool) -> Self {
        Self { sink, debug }
    }

    async fn log_error(
        &self,
        ctx: &RequestContext,
        method: &Method,
        path: &str,
        status: StatusCode,
        kind: &str,
        detail: &ErrorDetail,
    ) {
        let severity = if status.is_server_error() {
            Severity::Error
        } else {
            Severity::Warn
        };

        let mut record = LogRecord::new(LogCategory::Error, severity, "Request failed")
            .field("request_id", ctx.request_id())
            .field("method", method.as_str())
            .field("path", path)
            .field("status", status.as_u16())
            .field("kind", kind)
            .field("code", detail.code.as_str())
            .field("internal", detail.internal.as_str())
            .field("user_message", detail.user_message.as_str());
        if !detail.field_errors.is_empty() {
            record = record.field(
                "field_errors",
                serde_json::to_value(&detail.field_errors).unwrap_or_default(),
            );
        }
        if let Some(trace) = &detail.trace {
            record = record.field("trace", trace.as_str());
        }
        if let Some(identity) = ctx.identity() {
            record = record.field("user_id", identity.user_id.as_str());
        }

        self.sink.emit(record).await;
    }
}

#[async_trait]
impl Stage for ErrorHandlerStage {
    fn name(&self) -> &'static str {
        "error_handler"
    }

    async fn process(&self, mut req: Request, next: Next) -> Response {
        let ctx = Arc::new(RequestContext::new());
        req.extensions_mut().insert(ctx.clone());
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let mut response = match AssertUnwindSafe(next.run(req)).catch_unwind().await {
            Ok(response) => response,
            Err(payload) => AppError::from_panic(payload).into_response(),
        };

        let typed = response.extensions_mut().remove::<AppError>();
        if let Some(err) = typed {
            self.log_error(&ctx, &method, &path, err.status(), err.kind(), err.detail())
                .await;
            response = rerender(response, err.render(ctx.request_id(), self.debug));
        } else if is_bare_error(&response) {
            let status = response.status();
            let (kind, detail) = framework_error(status);
            self.log_error(&ctx, &method, &path, status, kind, &detail)
                .await;
            response = rerender(response, render_with_status(status, ctx.request_id()));
        }

        if let Ok(value) = HeaderValue::from_str(ctx.request_id()) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }
}

/// Error status without a JSON body: produced by the framework, not by us.
fn is_bare_error(response: &Response) -> bool {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return false;
    }
    !response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"))
}

fn framework_code(status: StatusCode) -> String {
    format!("HTTP_{}", status.as_u16())
}

/// Log kind and detail of a framework error. Server errors count as
/// unclassified; client errors keep their own `http` kind.
fn framework_error(status: StatusCode) -> (&'static str, ErrorDetail) {
    let reason = status.canonical_reason().unwrap_or("error");
    let (kind, user_message) = if status.is_server_error() {
        ("unclassified", crate::error::GENERIC_INTERNAL_MESSAGE)
    } else {
        (HTTP_ERROR_KIND, reason)
    };
    let detail = ErrorDetail {
        code: framework_code(status),
        internal: format!("framework response {reason}"),
        user_message: user_message.to_string(),
        field_errors: Default::default(),
        trace: None,
    };
    (kind, detail)
}

fn render_with_status(status: StatusCode, request_id: &str) -> Response {
    let user_message = if status.is_server_error() {
        crate::error::GENERIC_INTERNAL_MESSAGE.to_string()
    } else {
        status.canonical_reason().unwrap_or("Request failed").to_string()
    };
    let body = ErrorEnvelope {
        error: ErrorBody {
            code: framework_code(status),
            message: None,
            user_message,
            details: Default::default(),
            request_id: request_id.to_string(),
            timestamp: now_rfc3339(),
            trace: None,
        },
    };
    (status, Json(body)).into_response()
}

/// Swaps the body for `rendered`, keeping headers set by inner stages.
fn rerender(original: Response, mut rendered: Response) -> Response {
    let (parts, _) = original.into_parts();
    for (name, value) in parts.headers.iter() {
        if name == header::CONTENT_LENGTH || rendered.headers().contains_key(name) {
            continue;
        }
        rendered.headers_mut().append(name.clone(), value.clone());
    }
    rendered
}
