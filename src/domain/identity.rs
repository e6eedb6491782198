//! Verified credential claims and caller identity.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Claims carried by an access credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: String,
    /// Expiry, seconds since the Unix epoch.
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    /// Unique credential identifier, used for revocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    /// `access` or `refresh`. Only access credentials authenticate requests.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

/// The resolved caller attached to a request after authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_id: String,
    /// Disabled subjects hold valid credentials but are refused.
    pub is_active: bool,
}

impl Identity {
    pub fn active(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            is_active: true,
        }
    }
}

/// Resolves a verified credential subject to an identity.
///
/// Owned by the user-management subsystem; the pipeline only consumes it.
///
/// # Returns
///
/// - `Ok(Some(identity))` when the subject exists
/// - `Ok(None)` when the subject is unknown
///
/// # Errors
///
/// Returns [`AppError::DataStore`] or [`AppError::Upstream`] when the lookup
/// itself fails.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, claims: &Claims) -> Result<Option<Identity>, AppError>;
}
