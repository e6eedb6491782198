//! Per-request context shared by every pipeline stage.
//!
//! Created exactly once by the outermost stage, stored in the request
//! extensions as an `Arc`, and dropped when the response is finalized.
//! Inner stages write into it (identity, security events, log fields);
//! outer stages read it back while the response unwinds.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use axum::http::Request;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::identity::Identity;
use crate::domain::log_record::LogCategory;

/// Security-relevant outcome flagged by a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SecurityEvent {
    XssDetected { field: String },
    SqlInjectionDetected { field: String },
    InvalidCredential { reason: String },
    RevokedCredential { credential_id: String },
    InactiveIdentity { user_id: String },
    RateLimitExceeded { identity: String, count: u64, limit: u64 },
    BlockedIdentity { identity: String },
    BotDetected { user_agent: String },
}

impl SecurityEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::XssDetected { .. } => "xss_detected",
            Self::SqlInjectionDetected { .. } => "sql_injection_detected",
            Self::InvalidCredential { .. } => "invalid_credential",
            Self::RevokedCredential { .. } => "revoked_credential",
            Self::InactiveIdentity { .. } => "inactive_identity",
            Self::RateLimitExceeded { .. } => "rate_limit_exceeded",
            Self::BlockedIdentity { .. } => "blocked_identity",
            Self::BotDetected { .. } => "bot_detected",
        }
    }
}

#[derive(Debug)]
pub struct RequestContext {
    request_id: String,
    received_at: DateTime<Utc>,
    started: Instant,
    identity: OnceLock<Identity>,
    credential_id: OnceLock<String>,
    security_events: Mutex<Vec<SecurityEvent>>,
    fields: Mutex<BTreeMap<LogCategory, Map<String, Value>>>,
}

impl RequestContext {
    /// Creates a context with a fresh v4 correlation id.
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            received_at: Utc::now(),
            started: Instant::now(),
            identity: OnceLock::new(),
            credential_id: OnceLock::new(),
            security_events: Mutex::new(Vec::new()),
            fields: Mutex::new(BTreeMap::new()),
        }
    }

    /// Fetches the context a previous stage stored in the request extensions.
    pub fn from_request<B>(req: &Request<B>) -> Option<Arc<Self>> {
        req.extensions().get::<Arc<Self>>().cloned()
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.get()
    }

    pub fn credential_id(&self) -> Option<&str> {
        self.credential_id.get().map(String::as_str)
    }

    /// Attaches the authenticated caller. Returns `false` if one was already set.
    pub fn attach_identity(&self, identity: Identity, credential_id: String) -> bool {
        let attached = self.identity.set(identity).is_ok();
        if attached {
            let _ = self.credential_id.set(credential_id);
        }
        attached
    }

    pub fn record_security_event(&self, event: SecurityEvent) {
        self.security_events.lock().push(event);
    }

    pub fn security_events(&self) -> Vec<SecurityEvent> {
        self.security_events.lock().clone()
    }

    /// Adds a field to be emitted with the given category's record.
    pub fn add_field(&self, category: LogCategory, key: &str, value: impl Into<Value>) {
        self.fields
            .lock()
            .entry(category)
            .or_default()
            .insert(key.to_string(), value.into());
    }

    pub fn fields(&self, category: LogCategory) -> Map<String, Value> {
        self.fields
            .lock()
            .get(&category)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
