//! Shared counter/key-value store backing rate limiting and revocation.
//!
//! Provides a [`CounterStore`] trait with two implementations:
//! - [`RedisStore`] - Production Redis-backed store, shared across instances
//! - [`MemoryStore`] - In-process store for development and tests

mod memory_store;
mod redis_store;
mod service;

pub use memory_store::MemoryStore;
pub use redis_store::RedisStore;
pub use service::{CounterStore, StoreError, StoreResult};

#[cfg(test)]
pub use service::MockCounterStore;
