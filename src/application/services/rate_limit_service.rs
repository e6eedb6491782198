//! Fixed-window rate limiting over the shared store.

use chrono::Utc;
use std::sync::Arc;
use tracing::warn;

use crate::config::{RateLimitConfig, Window};
use crate::infrastructure::store::{CounterStore, StoreResult};

/// Source of the current time in seconds since the epoch.
pub type Clock = fn() -> u64;

/// Store key of the counter for `identity` in `window` at `bucket`.
///
/// The primary window keeps the short `rate_limit:<identity>:<bucket>` shape.
pub fn counter_key(identity: &str, window: &Window, bucket: u64) -> String {
    if window.name == PRIMARY_WINDOW {
        format!("rate_limit:{identity}:{bucket}")
    } else {
        format!("rate_limit:{identity}:{}:{bucket}", window.name)
    }
}

const PRIMARY_WINDOW: &str = "window";

/// Outcome of one admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Counted; `limit` and `remaining` describe the tightest window.
    Allowed { limit: u64, remaining: u64 },
    Limited {
        window: &'static str,
        count: u64,
        limit: u64,
        retry_after: u64,
    },
    /// Blacklisted identity; nothing was counted.
    Blocked,
    /// Whitelisted identity; nothing was counted.
    Bypassed,
    /// The store could not be reached; the request is let through.
    Degraded,
}

/// Counts requests per identity in fixed windows.
///
/// Every request is counted in the primary window of `window_seconds` and
/// in the optional hourly and daily windows. The bucket is
/// `floor(now / window)`. The first increment in a bucket sets a TTL equal
/// to what is left of the window, so old buckets expire on their own.
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    config: RateLimitConfig,
    clock: Clock,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, config: RateLimitConfig) -> Self {
        Self {
            store,
            config,
            clock: now_secs,
        }
    }

    /// Replaces the wall clock used by [`check`](Self::check),
    /// [`usage`](Self::usage) and [`reset`](Self::reset).
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn is_blacklisted(&self, identity: &str) -> bool {
        self.config.blacklist.contains(identity)
    }

    /// Counts one request for `identity` at the current time.
    pub async fn check(&self, identity: &str) -> Decision {
        self.check_at(identity, (self.clock)()).await
    }

    /// Counts one request for `identity` at `now` (seconds since the epoch).
    ///
    /// A request over any window is limited, and `retry_after` is the
    /// longest wait among the exceeded windows. Store errors fail open.
    pub async fn check_at(&self, identity: &str, now: u64) -> Decision {
        if self.is_blacklisted(identity) {
            return Decision::Blocked;
        }
        if self.config.whitelist.contains(identity) {
            return Decision::Bypassed;
        }

        let mut tightest: Option<(u64, u64)> = None;
        let mut exceeded: Option<Decision> = None;

        for window in self.config.windows() {
            let ttl = window.seconds - now % window.seconds;
            let key = counter_key(identity, &window, now / window.seconds);

            let count = match self.store.incr_with_expiry(&key, ttl).await {
                Ok(count) => count,
                Err(e) => {
                    warn!(identity, error = %e, "Rate limit store unavailable, allowing request");
                    metrics::counter!("store_degraded_total").increment(1);
                    return Decision::Degraded;
                }
            };

            if count > window.limit {
                let longer = match exceeded {
                    Some(Decision::Limited { retry_after, .. }) => ttl > retry_after,
                    _ => true,
                };
                if longer {
                    exceeded = Some(Decision::Limited {
                        window: window.name,
                        count,
                        limit: window.limit,
                        retry_after: ttl,
                    });
                }
                continue;
            }

            let remaining = window.limit - count;
            if tightest.is_none_or(|(_, r)| remaining < r) {
                tightest = Some((window.limit, remaining));
            }
        }

        if let Some(limited) = exceeded {
            return limited;
        }
        let (limit, remaining) = tightest.unwrap_or((self.config.requests, 0));
        Decision::Allowed { limit, remaining }
    }

    /// Requests counted for `identity` in the current primary window.
    pub async fn usage(&self, identity: &str) -> StoreResult<u64> {
        let window = self.primary();
        let key = counter_key(identity, &window, (self.clock)() / window.seconds);
        Ok(self
            .store
            .get(&key)
            .await?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0))
    }

    /// Clears `identity`'s counters for the current buckets of every window.
    /// Returns whether anything had been counted.
    pub async fn reset(&self, identity: &str) -> StoreResult<bool> {
        let now = (self.clock)();
        let mut existed = false;
        for window in self.config.windows() {
            let key = counter_key(identity, &window, now / window.seconds);
            existed |= self.store.delete(&key).await?;
        }
        Ok(existed)
    }

    fn primary(&self) -> Window {
        self.config.windows()[0]
    }
}

fn now_secs() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::store::{MemoryStore, MockCounterStore, StoreError};
    use std::collections::HashSet;

    fn limiter(requests: u64, window_seconds: u64) -> RateLimiter {
        RateLimiter::new(
            Arc::new(MemoryStore::new()),
            RateLimitConfig {
                requests,
                window_seconds,
                ..RateLimitConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn test_limit_plus_one_is_rejected() {
        let limiter = limiter(10, 60);
        let now = 1_000_060;

        for i in 1..=10 {
            assert_eq!(
                limiter.check_at("ip:1.2.3.4", now).await,
                Decision::Allowed {
                    limit: 10,
                    remaining: 10 - i
                }
            );
        }

        match limiter.check_at("ip:1.2.3.4", now).await {
            Decision::Limited {
                count, retry_after, ..
            } => {
                assert_eq!(count, 11);
                // 1_000_060 is 40s into its 60s window
                assert_eq!(retry_after, 20);
            }
            other => panic!("expected Limited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_identities_are_counted_separately() {
        let limiter = limiter(1, 60);
        let now = 1_000_000;

        assert!(matches!(
            limiter.check_at("user:1", now).await,
            Decision::Allowed { .. }
        ));
        assert!(matches!(
            limiter.check_at("user:2", now).await,
            Decision::Allowed { .. }
        ));
        assert!(matches!(
            limiter.check_at("user:1", now).await,
            Decision::Limited { .. }
        ));
    }

    #[tokio::test]
    async fn test_next_window_starts_fresh() {
        let limiter = limiter(1, 60);

        limiter.check_at("ip:a", 999_960).await;
        assert!(matches!(
            limiter.check_at("ip:a", 1_000_019).await,
            Decision::Limited { .. }
        ));
        assert!(matches!(
            limiter.check_at("ip:a", 1_000_020).await,
            Decision::Allowed { .. }
        ));
    }

    #[tokio::test]
    async fn test_ttl_is_remaining_window() {
        let mut store = MockCounterStore::new();
        store
            .expect_incr_with_expiry()
            .withf(|key, ttl| key.to_string() == "rate_limit:ip:a:16666" && *ttl == 60)
            .times(1)
            .returning(|_, _| Ok(1));

        let limiter = RateLimiter::new(
            Arc::new(store),
            RateLimitConfig {
                requests_per_hour: None,
                requests_per_day: None,
                ..RateLimitConfig::default()
            },
        );
        // 999_960 is exactly on a window boundary
        limiter.check_at("ip:a", 999_960).await;
    }

    #[tokio::test]
    async fn test_whitelisted_identity_is_not_counted() {
        let store = MockCounterStore::new();
        let limiter = RateLimiter::new(
            Arc::new(store),
            RateLimitConfig {
                whitelist: HashSet::from(["ip:10.0.0.1".to_string()]),
                ..RateLimitConfig::default()
            },
        );

        assert_eq!(limiter.check("ip:10.0.0.1").await, Decision::Bypassed);
    }

    #[tokio::test]
    async fn test_store_failure_fails_open() {
        let mut store = MockCounterStore::new();
        store
            .expect_incr_with_expiry()
            .returning(|_, _| Err(StoreError::ConnectionError("refused".to_string())));

        let limiter = RateLimiter::new(Arc::new(store), RateLimitConfig::default());
        assert_eq!(limiter.check("ip:a").await, Decision::Degraded);
    }

    #[tokio::test]
    async fn test_concurrent_increments_do_not_undercount() {
        let limiter = Arc::new(limiter(50, 3600));
        let now = 7_200;

        let handles: Vec<_> = (0..100)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.check_at("ip:burst", now).await })
            })
            .collect();

        let mut allowed = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), Decision::Allowed { .. }) {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 50);
    }

    #[tokio::test]
    async fn test_usage_reads_current_window() {
        let limiter = limiter(10, 60);
        limiter.check("user:9").await;
        limiter.check("user:9").await;

        let usage = limiter.usage("user:9").await.unwrap();
        // A window boundary between the two calls can only lower the count.
        assert!((1..=2).contains(&usage));
    }

    #[tokio::test]
    async fn test_reset_clears_current_window() {
        let limiter = limiter(1, 3600);
        limiter.check("ip:198.51.100.4").await;

        assert!(limiter.reset("ip:198.51.100.4").await.unwrap());
        assert_eq!(limiter.usage("ip:198.51.100.4").await.unwrap(), 0);
        assert!(!limiter.reset("ip:198.51.100.4").await.unwrap());
    }

    #[tokio::test]
    async fn test_blacklisted_identity_is_blocked_before_counting() {
        let store = MockCounterStore::new();
        let limiter = RateLimiter::new(
            Arc::new(store),
            RateLimitConfig {
                whitelist: HashSet::from(["ip:203.0.113.7".to_string()]),
                blacklist: HashSet::from(["ip:203.0.113.7".to_string()]),
                ..RateLimitConfig::default()
            },
        );

        assert_eq!(limiter.check("ip:203.0.113.7").await, Decision::Blocked);
        assert!(limiter.is_blacklisted("ip:203.0.113.7"));
        assert!(!limiter.is_blacklisted("ip:203.0.113.8"));
    }

    #[tokio::test]
    async fn test_hourly_window_limits_across_minutes() {
        let limiter = RateLimiter::new(
            Arc::new(MemoryStore::new()),
            RateLimitConfig {
                requests: 100,
                window_seconds: 60,
                requests_per_hour: Some(3),
                requests_per_day: None,
                ..RateLimitConfig::default()
            },
        );
        let hour_start = 3_600 * 1_000;

        for minute in 0..3 {
            assert!(matches!(
                limiter.check_at("user:7", hour_start + minute * 60).await,
                Decision::Allowed { .. }
            ));
        }

        match limiter.check_at("user:7", hour_start + 180).await {
            Decision::Limited {
                window,
                limit,
                retry_after,
                ..
            } => {
                assert_eq!(window, "hour");
                assert_eq!(limit, 3);
                assert_eq!(retry_after, 3_600 - 180);
            }
            other => panic!("expected Limited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_allowed_reports_tightest_window() {
        let limiter = RateLimiter::new(
            Arc::new(MemoryStore::new()),
            RateLimitConfig {
                requests: 10,
                window_seconds: 60,
                requests_per_hour: Some(3),
                requests_per_day: Some(1_000),
                ..RateLimitConfig::default()
            },
        );

        assert_eq!(
            limiter.check_at("ip:a", 1_000_000).await,
            Decision::Allowed {
                limit: 3,
                remaining: 2
            }
        );
    }

    #[tokio::test]
    async fn test_extra_windows_use_their_own_keys() {
        let mut store = MockCounterStore::new();
        store
            .expect_incr_with_expiry()
            .withf(|key, ttl| key.to_string() == "rate_limit:ip:a:16666" && *ttl == 60)
            .times(1)
            .returning(|_, _| Ok(1));
        store
            .expect_incr_with_expiry()
            .withf(|key, ttl| key.to_string() == "rate_limit:ip:a:hour:277" && *ttl == 840)
            .times(1)
            .returning(|_, _| Ok(1));
        store
            .expect_incr_with_expiry()
            .withf(|key, ttl| key.to_string() == "rate_limit:ip:a:day:11" && *ttl == 36_840)
            .times(1)
            .returning(|_, _| Ok(1));

        let limiter = RateLimiter::new(Arc::new(store), RateLimitConfig::default());
        limiter.check_at("ip:a", 999_960).await;
    }

    #[tokio::test]
    async fn test_injected_clock_drives_check() {
        let limiter = RateLimiter::new(
            Arc::new(MemoryStore::new()),
            RateLimitConfig {
                requests: 1,
                ..RateLimitConfig::default()
            },
        )
        .with_clock(|| 1_000_060);

        limiter.check("ip:fixed").await;
        match limiter.check("ip:fixed").await {
            Decision::Limited { retry_after, .. } => assert_eq!(retry_after, 20),
            other => panic!("expected Limited, got {other:?}"),
        }
        assert_eq!(limiter.usage("ip:fixed").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_reset_clears_every_window() {
        let store = Arc::new(MemoryStore::new());
        let limiter = RateLimiter::new(store.clone(), RateLimitConfig::default())
            .with_clock(|| 1_000_060);
        limiter.check("user:3").await;

        assert!(limiter.reset("user:3").await.unwrap());
        assert_eq!(store.get("rate_limit:user:3:hour:277").await.unwrap(), None);
        assert_eq!(store.get("rate_limit:user:3:day:11").await.unwrap(), None);
    }
}
