//! Redis-backed store implementation.

use super::service::{CounterStore, StoreError, StoreResult};
use async_trait::async_trait;
use redis::{AsyncCommands, Client, Script, aio::ConnectionManager};
use tracing::{debug, info};

/// `INCR` and first-hit `EXPIRE` in one server-side step, so concurrent
/// requests can neither undercount nor leave a counter without expiry.
const INCR_WITH_EXPIRY: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return count
"#;

/// Redis store shared by every service instance.
///
/// Uses `ConnectionManager` for connection reuse and automatic reconnects.
pub struct RedisStore {
    client: ConnectionManager,
    incr_script: Script,
    key_prefix: String,
}

impl RedisStore {
    /// Connects to Redis and validates the connection with a PING.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConnectionError`] if the URL is invalid, the
    /// connection cannot be established, or the PING fails.
    pub async fn connect(redis_url: &str) -> StoreResult<Self> {
        info!(
            "Connecting to Redis at {}",
            crate::config::mask_connection_string(redis_url)
        );

        let client = Client::open(redis_url).map_err(|e| {
            StoreError::ConnectionError(format!("Failed to create Redis client: {}", e))
        })?;

        let manager = ConnectionManager::new(client).await.map_err(|e| {
            StoreError::ConnectionError(format!("Failed to connect to Redis: {}", e))
        })?;

        let mut test_conn = manager.clone();
        test_conn
            .ping::<()>()
            .await
            .map_err(|e| StoreError::ConnectionError(format!("Redis PING failed: {}", e)))?;

        info!("Connected to Redis");

        Ok(Self {
            client: manager,
            incr_script: Script::new(INCR_WITH_EXPIRY),
            key_prefix: "guard:".to_string(),
        })
    }

    /// Constructs the full Redis key with namespace prefix.
    fn build_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

fn op_error(op: &str, key: &str, e: redis::RedisError) -> StoreError {
    StoreError::OperationError(format!("Redis {} failed for {}: {}", op, key, e))
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn incr_with_expiry(&self, key: &str, ttl_seconds: u64) -> StoreResult<u64> {
        let full_key = self.build_key(key);
        let mut conn = self.client.clone();

        let count: u64 = self
            .incr_script
            .key(&full_key)
            .arg(ttl_seconds.max(1))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| op_error("INCR", key, e))?;

        debug!("Store INCR: {} -> {}", key, count);
        Ok(count)
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.client.clone();
        conn.get::<_, Option<String>>(self.build_key(key))
            .await
            .map_err(|e| op_error("GET", key, e))
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl_seconds: u64) -> StoreResult<()> {
        let mut conn = self.client.clone();
        conn.set_ex::<_, _, ()>(self.build_key(key), value, ttl_seconds.max(1))
            .await
            .map_err(|e| op_error("SETEX", key, e))?;
        debug!("Store SET: {} (TTL: {}s)", key, ttl_seconds);
        Ok(())
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.client.clone();
        conn.exists::<_, bool>(self.build_key(key))
            .await
            .map_err(|e| op_error("EXISTS", key, e))
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.client.clone();
        let deleted = conn
            .del::<_, i64>(self.build_key(key))
            .await
            .map_err(|e| op_error("DEL", key, e))?;
        Ok(deleted > 0)
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.client.clone();
        conn.ping::<()>().await.is_ok()
    }
}
