//! HTTP server initialization and runtime setup.
//!
//! Connects the shared store, builds the pipeline state and runs the Axum
//! server until a shutdown signal arrives.

use crate::config::Config;
use crate::infrastructure::identity::ClaimsIdentityResolver;
use crate::infrastructure::log_sink::TracingSink;
use crate::infrastructure::store::{CounterStore, MemoryStore, RedisStore};
use crate::routes::app_router;
use crate::state::AppState;

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};

/// Connection attempts before startup gives up on Redis.
const STORE_CONNECT_ATTEMPTS: usize = 5;

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - Shared counter store: Redis when `REDIS_URL` is set, in-memory otherwise
/// - Structured log sink and identity resolver
/// - Axum HTTP server with peer address info for rate limiting
///
/// # Errors
///
/// Returns an error if:
/// - Redis is configured but unreachable after retries
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let store = connect_store(&config).await?;

    let state = AppState::new(
        config,
        store,
        Arc::new(TracingSink::new()),
        Arc::new(ClaimsIdentityResolver::new()),
    );

    let addr: SocketAddr = state.config.listen_addr.parse()?;
    let app = app_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Opens the counter store.
///
/// A configured Redis that cannot be reached is fatal: running with
/// per-instance counters would silently multiply the effective rate limit.
async fn connect_store(config: &Config) -> Result<Arc<dyn CounterStore>> {
    let Some(redis_url) = &config.redis_url else {
        tracing::warn!("REDIS_URL not set; using in-memory store (single instance only)");
        return Ok(Arc::new(MemoryStore::new()));
    };

    let strategy = ExponentialBackoff::from_millis(100)
        .max_delay(std::time::Duration::from_secs(2))
        .map(jitter)
        .take(STORE_CONNECT_ATTEMPTS - 1);

    let store = Retry::spawn(strategy, || async {
        RedisStore::connect(redis_url).await.inspect_err(|e| {
            tracing::warn!("Redis connection attempt failed: {}", e);
        })
    })
    .await
    .context("Failed to connect to Redis")?;

    Ok(Arc::new(store))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
