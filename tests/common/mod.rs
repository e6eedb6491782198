#![allow(dead_code)]

use async_trait::async_trait;
use axum_test::TestServer;
use request_guard::application::services::rate_limit_service::{Clock, RateLimiter};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use request_guard::config::{
    AuthConfig, Config, Environment, LoggingConfig, RateLimitConfig, ValidationConfig,
};
use request_guard::domain::identity::Claims;
use request_guard::infrastructure::identity::ClaimsIdentityResolver;
use request_guard::infrastructure::log_sink::MemorySink;
use request_guard::infrastructure::store::{CounterStore, MemoryStore, StoreError, StoreResult};
use request_guard::routes::service_router;
use request_guard::state::AppState;
use std::sync::Arc;

pub const SECRET: &str = "integration-secret";

pub fn test_config() -> Config {
    Config {
        listen_addr: "127.0.0.1:0".to_string(),
        redis_url: None,
        log_level: "info".to_string(),
        log_format: "text".to_string(),
        environment: Environment::Development,
        debug: false,
        validation: ValidationConfig::default(),
        rate_limit: RateLimitConfig {
            requests: 10,
            window_seconds: 60,
            ..RateLimitConfig::default()
        },
        auth: AuthConfig {
            jwt_secret: SECRET.to_string(),
            leeway_seconds: 0,
            public_paths: vec!["/health".to_string()],
        },
        logging: LoggingConfig::default(),
    }
}

/// The bundled routes behind the full pipeline, with an inspectable sink.
pub struct TestApp {
    pub server: TestServer,
    pub sink: Arc<MemorySink>,
    pub store: Arc<dyn CounterStore>,
    pub state: AppState,
}

pub fn create_test_app(config: Config) -> TestApp {
    create_test_app_with_store(config, Arc::new(MemoryStore::new()))
}

pub fn create_test_app_with_store(config: Config, store: Arc<dyn CounterStore>) -> TestApp {
    build(config, store, None)
}

/// Like [`create_test_app`], with the rate limiter reading `clock`.
pub fn create_test_app_with_clock(config: Config, clock: Clock) -> TestApp {
    build(config, Arc::new(MemoryStore::new()), Some(clock))
}

fn build(config: Config, store: Arc<dyn CounterStore>, clock: Option<Clock>) -> TestApp {
    let sink = Arc::new(MemorySink::new());
    let mut state = AppState::new(
        config,
        store.clone(),
        sink.clone(),
        Arc::new(ClaimsIdentityResolver::new()),
    );
    if let Some(clock) = clock {
        state.limiter = Arc::new(
            RateLimiter::new(store.clone(), state.config.rate_limit.clone()).with_clock(clock),
        );
    }
    let server = TestServer::new(service_router(state.clone())).unwrap();

    TestApp {
        server,
        sink,
        store,
        state,
    }
}

pub fn claims(sub: &str) -> Claims {
    let now = Utc::now().timestamp() as u64;
    Claims {
        sub: sub.to_string(),
        exp: now + 600,
        iat: Some(now),
        jti: None,
        token_type: Some("access".to_string()),
        active: None,
    }
}

pub fn sign(claims: &Claims) -> String {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn token_for(sub: &str) -> String {
    sign(&claims(sub))
}

/// A store whose every operation fails, as if Redis were down.
pub struct FailingStore;

fn refused<T>() -> StoreResult<T> {
    Err(StoreError::ConnectionError("connection refused".to_string()))
}

#[async_trait]
impl CounterStore for FailingStore {
    async fn incr_with_expiry(&self, _key: &str, _ttl_seconds: u64) -> StoreResult<u64> {
        refused()
    }

    async fn get(&self, _key: &str) -> StoreResult<Option<String>> {
        refused()
    }

    async fn set_with_expiry(&self, _key: &str, _value: &str, _ttl: u64) -> StoreResult<()> {
        refused()
    }

    async fn exists(&self, _key: &str) -> StoreResult<bool> {
        refused()
    }

    async fn delete(&self, _key: &str) -> StoreResult<bool> {
        refused()
    }

    async fn health_check(&self) -> bool {
        false
    }
}
