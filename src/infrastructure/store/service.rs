//! Store trait and error types.

use async_trait::async_trait;

/// Errors that can occur during store operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("Store connection error: {0}")]
    ConnectionError(String),
    #[error("Store operation error: {0}")]
    OperationError(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Atomic counters and expiring keys shared by every pipeline instance.
///
/// Unlike a cache, errors are surfaced to the caller: the rate limiter
/// fails open on them, the auth verifier fails closed.
///
/// # Implementations
///
/// - [`crate::infrastructure::store::RedisStore`] - Redis, atomic via a server-side script
/// - [`crate::infrastructure::store::MemoryStore`] - in-process, atomic per key
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increments `key` and returns the new value.
    ///
    /// The first increment (result `1`) sets a time-to-live of `ttl_seconds`;
    /// later increments leave the expiry untouched so the key disappears at
    /// the end of its window.
    async fn incr_with_expiry(&self, key: &str, ttl_seconds: u64) -> StoreResult<u64>;

    /// Reads a value. Expired keys read as `None`.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Writes a value that expires after `ttl_seconds`.
    async fn set_with_expiry(&self, key: &str, value: &str, ttl_seconds: u64) -> StoreResult<()>;

    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Removes a key. Returns whether it existed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Checks if the store backend is reachable.
    async fn health_check(&self) -> bool;
}
