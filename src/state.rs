use std::sync::Arc;

use crate::application::services::{RateLimiter, TokenVerifier};
use crate::config::Config;
use crate::domain::identity::IdentityResolver;
use crate::infrastructure::log_sink::{LogSink, RedactingSink};
use crate::infrastructure::store::CounterStore;

/// Everything the pipeline and the handlers share.
///
/// Built once at startup; configuration is frozen from here on.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn CounterStore>,
    /// Redacting sink; every record goes through it.
    pub sink: Arc<dyn LogSink>,
    pub verifier: Arc<TokenVerifier>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn CounterStore>,
        sink: Arc<dyn LogSink>,
        resolver: Arc<dyn IdentityResolver>,
    ) -> Self {
        let sink: Arc<dyn LogSink> = Arc::new(RedactingSink::new(
            sink,
            config.logging.sensitive_fields.clone(),
        ));
        let verifier = Arc::new(TokenVerifier::new(&config.auth, store.clone(), resolver));
        let limiter = Arc::new(RateLimiter::new(store.clone(), config.rate_limit.clone()));

        Self {
            config: Arc::new(config),
            store,
            sink,
            verifier,
            limiter,
        }
    }
}
