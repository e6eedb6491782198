//! Bearer credential verification.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, errors::ErrorKind};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::domain::context::SecurityEvent;
use crate::domain::identity::{Claims, Identity, IdentityResolver};
use crate::error::AppError;
use crate::infrastructure::store::CounterStore;

/// Store key marking a credential identifier as revoked.
pub fn revocation_key(credential_id: &str) -> String {
    format!("revoked:{credential_id}")
}

/// Identifier used for revocation: the `jti` claim, or the SHA-256 hex
/// fingerprint of the raw token when the issuer sets none.
pub fn credential_id(token: &str, claims: &Claims) -> String {
    match claims.jti.as_deref() {
        Some(jti) if !jti.is_empty() => jti.to_string(),
        _ => hex::encode(Sha256::digest(token.as_bytes())),
    }
}

/// A successfully verified caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified {
    pub identity: Identity,
    pub credential_id: String,
}

/// A refused credential and the security event it raised, if any.
///
/// Store outages raise no event: they say nothing about the caller.
#[derive(Debug)]
pub struct AuthRejection {
    pub error: AppError,
    pub event: Option<SecurityEvent>,
}

impl AuthRejection {
    fn invalid(reason: &str, internal: impl Into<String>) -> Self {
        Self {
            error: AppError::authentication(internal),
            event: Some(SecurityEvent::InvalidCredential {
                reason: reason.to_string(),
            }),
        }
    }
}

/// Verifies HS256 bearer credentials.
///
/// # Checks (in order)
///
/// 1. Signature and expiry, locally
/// 2. Credential type (`access` when the claim is present)
/// 3. Revocation list in the shared store (a hit always wins)
/// 4. Identity resolution; unknown subjects are unauthenticated, disabled
///    ones unauthorized
pub struct TokenVerifier {
    store: Arc<dyn CounterStore>,
    resolver: Arc<dyn IdentityResolver>,
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(
        config: &AuthConfig,
        store: Arc<dyn CounterStore>,
        resolver: Arc<dyn IdentityResolver>,
    ) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_seconds;

        Self {
            store,
            resolver,
            key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }

    /// Verifies `token` and resolves the caller.
    ///
    /// # Errors
    ///
    /// - [`AppError::Authentication`] (`AUTH_001`) for bad signatures, expired,
    ///   malformed or non-access credentials and unknown subjects
    /// - [`AppError::Authentication`] (`AUTH_003`) for revoked credentials
    /// - [`AppError::Authorization`] for inactive identities
    /// - [`AppError::Upstream`] when the revocation list cannot be read
    pub async fn verify(&self, token: &str) -> Result<Verified, AuthRejection> {
        let claims = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| {
                let reason = match e.kind() {
                    ErrorKind::ExpiredSignature => "expired",
                    ErrorKind::InvalidSignature => "invalid_signature",
                    ErrorKind::ImmatureSignature => "not_yet_valid",
                    _ => "malformed",
                };
                AuthRejection::invalid(reason, format!("credential rejected: {e}"))
            })?
            .claims;

        if let Some(kind) = claims.token_type.as_deref()
            && kind != "access"
        {
            return Err(AuthRejection::invalid(
                "wrong_type",
                format!("credential of type '{kind}' cannot authenticate requests"),
            ));
        }

        let credential_id = credential_id(token, &claims);
        let revoked = self
            .store
            .exists(&revocation_key(&credential_id))
            .await
            .map_err(|e| AuthRejection {
                error: AppError::upstream(format!("revocation list unavailable: {e}")),
                event: None,
            })?;
        if revoked {
            return Err(AuthRejection {
                error: AppError::revoked_credential(format!(
                    "credential {credential_id} has been revoked"
                )),
                event: Some(SecurityEvent::RevokedCredential { credential_id }),
            });
        }

        let identity = self
            .resolver
            .resolve(&claims)
            .await
            .map_err(|error| AuthRejection { error, event: None })?
            .ok_or_else(|| {
                AuthRejection::invalid(
                    "unknown_subject",
                    format!("no identity for subject '{}'", claims.sub),
                )
            })?;

        if !identity.is_active {
            return Err(AuthRejection {
                error: AppError::authorization(format!(
                    "identity {} is inactive",
                    identity.user_id
                )),
                event: Some(SecurityEvent::InactiveIdentity {
                    user_id: identity.user_id,
                }),
            });
        }

        Ok(Verified {
            identity,
            credential_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::identity::MockIdentityResolver;
    use crate::infrastructure::identity::ClaimsIdentityResolver;
    use crate::infrastructure::store::{MemoryStore, MockCounterStore, StoreError};
    use chrono::Utc;
    use jsonwebtoken::{EncodingKey, Header, encode};

    const SECRET: &str = "test-signing-secret";

    fn auth_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: SECRET.to_string(),
            leeway_seconds: 0,
            public_paths: Vec::new(),
        }
    }

    fn claims(sub: &str) -> Claims {
        Claims {
            sub: sub.to_string(),
            exp: Utc::now().timestamp() as u64 + 600,
            iat: None,
            jti: Some(format!("jti-{sub}")),
            token_type: Some("access".to_string()),
            active: None,
        }
    }

    fn mint(claims: &Claims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn verifier(store: Arc<dyn CounterStore>) -> TokenVerifier {
        TokenVerifier::new(&auth_config(), store, Arc::new(ClaimsIdentityResolver::new()))
    }

    fn reason_of(rejection: &AuthRejection) -> Option<&str> {
        match &rejection.event {
            Some(SecurityEvent::InvalidCredential { reason }) => Some(reason.as_str()),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_verify_success() {
        let token = mint(&claims("42"), SECRET);
        let verified = verifier(Arc::new(MemoryStore::new()))
            .verify(&token)
            .await
            .unwrap();

        assert_eq!(verified.identity, Identity::active("42"));
        assert_eq!(verified.credential_id, "jti-42");
    }

    #[tokio::test]
    async fn test_wrong_secret_rejected() {
        let token = mint(&claims("42"), "another-secret");
        let rejection = verifier(Arc::new(MemoryStore::new()))
            .verify(&token)
            .await
            .unwrap_err();

        assert!(matches!(rejection.error, AppError::Authentication(_)));
        assert_eq!(reason_of(&rejection), Some("invalid_signature"));
    }

    #[tokio::test]
    async fn test_expired_rejected() {
        let mut expired = claims("42");
        expired.exp = Utc::now().timestamp() as u64 - 120;
        let rejection = verifier(Arc::new(MemoryStore::new()))
            .verify(&mint(&expired, SECRET))
            .await
            .unwrap_err();

        assert_eq!(rejection.error.detail().code, "AUTH_001");
        assert_eq!(reason_of(&rejection), Some("expired"));
    }

    #[tokio::test]
    async fn test_garbage_rejected() {
        let rejection = verifier(Arc::new(MemoryStore::new()))
            .verify("not-a-jwt")
            .await
            .unwrap_err();
        assert_eq!(reason_of(&rejection), Some("malformed"));
    }

    #[tokio::test]
    async fn test_refresh_credential_rejected() {
        let mut refresh = claims("42");
        refresh.token_type = Some("refresh".to_string());
        let rejection = verifier(Arc::new(MemoryStore::new()))
            .verify(&mint(&refresh, SECRET))
            .await
            .unwrap_err();
        assert_eq!(reason_of(&rejection), Some("wrong_type"));
    }

    #[tokio::test]
    async fn test_revoked_wins_over_valid_signature() {
        let store = Arc::new(MemoryStore::new());
        store
            .set_with_expiry(&revocation_key("jti-42"), "1", 600)
            .await
            .unwrap();

        let rejection = verifier(store)
            .verify(&mint(&claims("42"), SECRET))
            .await
            .unwrap_err();

        assert_eq!(rejection.error.status(), 401);
        assert_eq!(rejection.error.detail().code, "AUTH_003");
        assert_eq!(
            rejection.event,
            Some(SecurityEvent::RevokedCredential {
                credential_id: "jti-42".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_fingerprint_used_without_jti() {
        let mut no_jti = claims("42");
        no_jti.jti = None;
        let token = mint(&no_jti, SECRET);

        let store = Arc::new(MemoryStore::new());
        let fingerprint = hex::encode(Sha256::digest(token.as_bytes()));
        store
            .set_with_expiry(&revocation_key(&fingerprint), "1", 600)
            .await
            .unwrap();

        let rejection = verifier(store).verify(&token).await.unwrap_err();
        assert_eq!(rejection.error.detail().code, "AUTH_003");
    }

    #[tokio::test]
    async fn test_store_outage_fails_closed() {
        let mut store = MockCounterStore::new();
        store
            .expect_exists()
            .times(1)
            .returning(|_| Err(StoreError::ConnectionError("refused".to_string())));

        let rejection = verifier(Arc::new(store))
            .verify(&mint(&claims("42"), SECRET))
            .await
            .unwrap_err();

        assert!(matches!(rejection.error, AppError::Upstream(_)));
        assert!(rejection.event.is_none());
    }

    #[tokio::test]
    async fn test_inactive_identity_is_authorization_error() {
        let mut resolver = MockIdentityResolver::new();
        resolver
            .expect_resolve()
            .withf(|claims| claims.sub == "7")
            .times(1)
            .returning(|claims| {
                Ok(Some(Identity {
                    user_id: claims.sub.clone(),
                    is_active: false,
                }))
            });

        let verifier = TokenVerifier::new(
            &auth_config(),
            Arc::new(MemoryStore::new()),
            Arc::new(resolver),
        );
        let rejection = verifier
            .verify(&mint(&claims("7"), SECRET))
            .await
            .unwrap_err();

        assert!(matches!(rejection.error, AppError::Authorization(_)));
        assert_eq!(rejection.error.status(), 403);
    }

    #[tokio::test]
    async fn test_unknown_subject_is_authentication_error() {
        let mut resolver = MockIdentityResolver::new();
        resolver.expect_resolve().returning(|_| Ok(None));

        let verifier = TokenVerifier::new(
            &auth_config(),
            Arc::new(MemoryStore::new()),
            Arc::new(resolver),
        );
        let rejection = verifier
            .verify(&mint(&claims("ghost"), SECRET))
            .await
            .unwrap_err();

        assert_eq!(reason_of(&rejection), Some("unknown_subject"));
    }
}
