//! Category-tagged request logging.

use async_trait::async_trait;
use axum::{
    body::{Body, HttpBody, to_bytes},
    extract::Request,
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};
use std::sync::Arc;

use super::{Stage, context_of, declared_length};
use crate::config::LoggingConfig;
use crate::domain::context::{RequestContext, SecurityEvent};
use crate::domain::log_record::{LogCategory, LogRecord, Severity};
use crate::error::AppError;
use crate::infrastructure::log_sink::LogSink;
use crate::utils::client_ip::client_ip;
use crate::utils::endpoint::{api_version, normalize_endpoint};
use crate::validation::structure::ROOT;

pub const PROCESS_TIME_HEADER: &str = "x-process-time";

/// User-agent fragments that mark automated clients.
const BOT_MARKERS: [&str; 4] = ["bot", "crawler", "spider", "scraper"];

/// Emits up to four records per request once the response is known.
///
/// | Category | When |
/// |---|---|
/// | `request` | always, excluded paths included |
/// | `performance` | duration above `slow_request_threshold_ms` |
/// | `security` | an inner stage recorded a security event |
/// | `analytics` | 2xx response to an authenticated caller |
///
/// Excluded paths (health checks) skip the body excerpt, `performance` and
/// `analytics`; they are still counted in `http_requests_total`. Security
/// records are never suppressed.
///
/// Query parameters and headers are logged as objects so the redacting
/// sink can mask them by name.
pub struct RequestLogStage {
    sink: Arc<dyn LogSink>,
    config: LoggingConfig,
}

/// What is known about the request before it is handed on.
struct Entry {
    method: String,
    path: String,
    excluded: bool,
    user_agent: Option<String>,
    referer: Option<String>,
    fields: Map<String, Value>,
}

impl RequestLogStage {
    pub fn new(sink: Arc<dyn LogSink>, config: LoggingConfig) -> Self {
        Self { sink, config }
    }

    /// Reads a JSON body small enough to log and puts it back.
    ///
    /// A body that turns out longer than it claimed is refused here: once
    /// read, it cannot be handed on intact.
    async fn body_excerpt(&self, req: Request) -> Result<(Request, Option<Value>), AppError> {
        let content_length = declared_length(&req);
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("application/json"));

        match content_length {
            Some(len) if is_json && len > 0 && len <= self.config.max_log_body_size as u64 => {}
            _ => return Ok((req, None)),
        }

        let (parts, body) = req.into_parts();
        match to_bytes(body, self.config.max_log_body_size).await {
            Ok(bytes) => {
                let excerpt = serde_json::from_slice(&bytes).ok();
                Ok((Request::from_parts(parts, Body::from(bytes)), excerpt))
            }
            Err(e) => Err(AppError::invalid_field(
                "VAL_MALFORMED",
                ROOT,
                format!("request body could not be read: {e}"),
            )),
        }
    }

    fn request_record(
        &self,
        ctx: &RequestContext,
        entry: &Entry,
        status: u16,
        ms: f64,
    ) -> LogRecord {
        let severity = if status >= 500 {
            Severity::Error
        } else if status >= 400 {
            Severity::Warn
        } else {
            Severity::Info
        };
        let mut record = LogRecord::new(LogCategory::Request, severity, "Request completed")
            .field("request_id", ctx.request_id())
            .field("timestamp", ctx.received_at().to_rfc3339())
            .field("status", status)
            .field("duration_ms", ms)
            .extend(entry.fields.clone())
            .extend(ctx.fields(LogCategory::Request));
        if let Some(identity) = ctx.identity() {
            record = record.field("user_id", identity.user_id.as_str());
        }
        record
    }

    fn performance_record(
        &self,
        ctx: &RequestContext,
        entry: &Entry,
        status: u16,
        ms: f64,
    ) -> LogRecord {
        LogRecord::new(LogCategory::Performance, Severity::Warn, "Slow request")
            .field("request_id", ctx.request_id())
            .field("method", entry.method.as_str())
            .field("path", entry.path.as_str())
            .field("status", status)
            .field("duration_ms", ms)
            .field("threshold_ms", self.config.slow_request_threshold_ms)
            .extend(ctx.fields(LogCategory::Performance))
    }

    fn security_record(
        &self,
        ctx: &RequestContext,
        entry: &Entry,
        status: u16,
    ) -> Option<LogRecord> {
        let events = ctx.security_events();
        if events.is_empty() {
            return None;
        }
        for event in &events {
            metrics::counter!("security_events_total", "event" => event.name()).increment(1);
        }

        let mut record =
            LogRecord::new(LogCategory::Security, Severity::Warn, "Security events detected")
                .field("request_id", ctx.request_id())
                .field("method", entry.method.as_str())
                .field("path", entry.path.as_str())
                .field("status", status)
                .field("events", serde_json::to_value(&events).unwrap_or_default());
        if let Some(ip) = entry.fields.get("client_ip") {
            record = record.field("client_ip", ip.clone());
        }
        if let Some(agent) = &entry.user_agent {
            record = record.field("user_agent", agent.as_str());
        }
        if let Some(identity) = ctx.identity() {
            record = record.field("user_id", identity.user_id.as_str());
        }
        Some(record.extend(ctx.fields(LogCategory::Security)))
    }

    fn analytics_record(
        &self,
        ctx: &RequestContext,
        entry: &Entry,
        status: u16,
        ms: f64,
    ) -> Option<LogRecord> {
        let identity = ctx.identity()?;
        if !(200..300).contains(&status) {
            return None;
        }

        let mut record = LogRecord::new(LogCategory::Analytics, Severity::Info, "API usage")
            .field("request_id", ctx.request_id())
            .field("user_id", identity.user_id.as_str())
            .field("method", entry.method.as_str())
            .field("resource", entry.path.as_str())
            .field("endpoint", normalize_endpoint(&entry.path))
            .field("status", status)
            .field("duration_ms", ms)
            .field("user_agent", entry.user_agent.as_deref().unwrap_or_default())
            .field("referer", entry.referer.as_deref().unwrap_or_default());
        if let Some(ip) = entry.fields.get("client_ip") {
            record = record.field("client_ip", ip.clone());
        }
        if let Some(version) = api_version(&entry.path) {
            record = record.field("api_version", version);
        }
        Some(record.extend(ctx.fields(LogCategory::Analytics)))
    }
}

/// Decoded query parameters; a repeated name keeps its last value.
fn query_map(query: &str) -> Map<String, Value> {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
        .collect()
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn is_bot(user_agent: &str) -> bool {
    let user_agent = user_agent.to_ascii_lowercase();
    BOT_MARKERS.iter().any(|marker| user_agent.contains(marker))
}

/// Declared size of a response body, from its header or its exact size hint.
fn response_size(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .or_else(|| response.body().size_hint().exact())
}

fn header_map(headers: &HeaderMap) -> Map<String, Value> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = value.to_str().unwrap_or("<binary>");
            (name.as_str().to_string(), Value::from(value))
        })
        .collect()
}

#[async_trait]
impl Stage for RequestLogStage {
    fn name(&self) -> &'static str {
        "request_log"
    }

    async fn process(&self, mut req: Request, next: Next) -> Response {
        let ctx = context_of(&mut req);
        let path = req.uri().path().to_string();
        let excluded = self.config.is_excluded(&path);

        let mut fields = Map::new();
        fields.insert("method".into(), req.method().as_str().into());
        fields.insert("path".into(), path.as_str().into());
        if let Some(query) = req.uri().query() {
            fields.insert("query".into(), Value::Object(query_map(query)));
        }
        // Logged as claimed; only the rate limiter needs an address it can trust.
        if let Some(ip) = client_ip(&req, true) {
            fields.insert("client_ip".into(), ip.to_string().into());
        }
        fields.insert("headers".into(), Value::Object(header_map(req.headers())));

        let user_agent = header_str(req.headers(), header::USER_AGENT);
        let referer = header_str(req.headers(), header::REFERER);
        if self.config.detect_bots
            && let Some(agent) = user_agent.as_deref().filter(|ua| is_bot(ua))
        {
            ctx.record_security_event(SecurityEvent::BotDetected {
                user_agent: agent.to_string(),
            });
        }

        let mut entry = Entry {
            method: req.method().to_string(),
            path,
            excluded,
            user_agent,
            referer,
            fields,
        };

        let mut response = if entry.excluded {
            next.run(req).await
        } else {
            match self.body_excerpt(req).await {
                Ok((req, excerpt)) => {
                    if let Some(body) = excerpt {
                        entry.fields.insert("body".into(), body);
                    }
                    next.run(req).await
                }
                Err(err) => err.into_response(),
            }
        };

        if self.config.log_responses {
            entry.fields.insert(
                "response_headers".into(),
                Value::Object(header_map(response.headers())),
            );
            if let Some(size) = response_size(&response) {
                entry.fields.insert("response_size".into(), size.into());
            }
        }

        let elapsed = ctx.elapsed();
        let ms = (elapsed.as_secs_f64() * 1_000_000.0).round() / 1000.0;
        let status = response.status().as_u16();
        if let Ok(value) = HeaderValue::from_str(&format!("{ms:.3}")) {
            response.headers_mut().insert(PROCESS_TIME_HEADER, value);
        }

        metrics::counter!(
            "http_requests_total",
            "method" => entry.method.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        self.sink
            .emit(self.request_record(&ctx, &entry, status, ms))
            .await;

        if let Some(record) = self.security_record(&ctx, &entry, status) {
            self.sink.emit(record).await;
        }

        if !entry.excluded {
            if elapsed.as_millis() > u128::from(self.config.slow_request_threshold_ms) {
                self.sink
                    .emit(self.performance_record(&ctx, &entry, status, ms))
                    .await;
            }
            if let Some(record) = self.analytics_record(&ctx, &entry, status, ms) {
                self.sink.emit(record).await;
            }
        }

        response
    }
}
