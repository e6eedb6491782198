//! In-process store implementation.

use super::service::{CounterStore, StoreError, StoreResult};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// How often writes also sweep every expired entry out of the map.
const SWEEP_EVERY: Duration = Duration::from_secs(30);

/// A store that lives inside the process.
///
/// Counters are only shared between requests of this instance, so rate
/// limits multiply with the number of replicas. Expired entries are dropped
/// on access, and writes sweep the whole map at most every [`SWEEP_EVERY`],
/// so window buckets that are never touched again do not pile up.
///
/// # Use Cases
///
/// - Development without Redis
/// - Tests (pairs with `tokio::time::pause` since expiry uses tokio's clock)
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
    last_sweep: Mutex<Instant>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            last_sweep: Mutex::new(Instant::now()),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        debug!("Using MemoryStore (single instance only)");
        Self::default()
    }

    /// Number of entries held, expired ones not yet swept included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!("MemoryStore swept {} expired entries", removed);
        }
        removed
    }

    fn purge_if_expired(&self, key: &str, now: Instant) {
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
    }

    /// Sweeps when the last sweep is old enough. Must not be called while
    /// holding an entry guard: `retain` locks every shard.
    fn maybe_sweep(&self, now: Instant) {
        let Some(mut last) = self.last_sweep.try_lock() else {
            return;
        };
        if now.duration_since(*last) < SWEEP_EVERY {
            return;
        }
        *last = now;
        drop(last);
        self.purge_expired();
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn incr_with_expiry(&self, key: &str, ttl_seconds: u64) -> StoreResult<u64> {
        let now = Instant::now();
        self.maybe_sweep(now);
        // The entry guard holds the shard lock, making read-modify-write atomic per key.
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: "0".to_string(),
            expires_at: None,
        });

        if entry.is_expired(now) {
            entry.value = "0".to_string();
            entry.expires_at = None;
        }

        let current: u64 = entry.value.parse().map_err(|_| {
            StoreError::OperationError(format!("value at {} is not an integer", key))
        })?;
        let next = current + 1;
        entry.value = next.to_string();
        if next == 1 {
            entry.expires_at = Some(now + Duration::from_secs(ttl_seconds.max(1)));
        }

        Ok(next)
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.purge_if_expired(key, Instant::now());
        Ok(self.entries.get(key).map(|e| e.value.clone()))
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl_seconds: u64) -> StoreResult<()> {
        self.maybe_sweep(Instant::now());
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_seconds.max(1))),
            },
        );
        Ok(())
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.purge_if_expired(key, Instant::now());
        Ok(self.entries.contains_key(key))
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn health_check(&self) -> bool {
        true
    }
}
