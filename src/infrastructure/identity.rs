//! Identity resolution from verified claims.

use async_trait::async_trait;

use crate::domain::identity::{Claims, Identity, IdentityResolver};
use crate::error::AppError;

/// Resolves identities straight from the verified claims.
///
/// The credential was signed by the issuer, so `sub` and the optional
/// `active` flag are trusted as-is. Deployments that keep user status in a
/// user store plug in their own [`IdentityResolver`] instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClaimsIdentityResolver;

impl ClaimsIdentityResolver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl IdentityResolver for ClaimsIdentityResolver {
    async fn resolve(&self, claims: &Claims) -> Result<Option<Identity>, AppError> {
        if claims.sub.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(Identity {
            user_id: claims.sub.clone(),
            is_active: claims.active.unwrap_or(true),
        }))
    }
}
