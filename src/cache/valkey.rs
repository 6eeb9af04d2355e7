//! Valkey/Redis cache backend for multi-instance deployments.

use super::{CacheError, CacheStore, RateWindow};
use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tracing::info;

/// Cache entries and rate windows stored in Valkey with native expiry.
#[derive(Clone)]
pub struct ValkeyCacheStore {
    conn: ConnectionManager,
    key_prefix: String,
}

impl ValkeyCacheStore {
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(backend_error)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(backend_error)?;
        info!("Connected to Valkey at {}", url);
        Ok(Self {
            conn,
            key_prefix: "lectern".to_string(),
        })
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }
}

fn backend_error(e: redis::RedisError) -> CacheError {
    CacheError::Backend(e.to_string())
}

fn ttl_millis(ttl: Duration) -> u64 {
    // PX 0 is rejected by the server
    (ttl.as_millis() as u64).max(1)
}

#[async_trait]
impl CacheStore for ValkeyCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        redis::cmd("GET")
            .arg(self.key(key))
            .query_async::<Option<String>>(&mut conn)
            .await
            .map_err(backend_error)
    }

    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(self.key(key))
            .arg(value)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async::<()>(&mut conn)
            .await
            .map_err(backend_error)
    }

    async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(self.key(key))
            .query_async::<()>(&mut conn)
            .await
            .map_err(backend_error)
    }

    async fn increment(&self, key: &str, window: Duration) -> Result<RateWindow, CacheError> {
        let key = self.key(key);
        let window_ms = ttl_millis(window);
        let mut conn = self.conn.clone();

        // INCR and PTTL in one round-trip; the first hit of a window has no
        // expiry yet and gets one below.
        let (count, mut remaining_ms): (u64, i64) = redis::pipe()
            .atomic()
            .cmd("INCR")
            .arg(&key)
            .cmd("PTTL")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .map_err(backend_error)?;

        if remaining_ms < 0 {
            redis::cmd("PEXPIRE")
                .arg(&key)
                .arg(window_ms)
                .query_async::<i32>(&mut conn)
                .await
                .map_err(backend_error)?;
            remaining_ms = window_ms as i64;
        }

        Ok(RateWindow {
            count,
            window_reset_at: Utc::now() + chrono::Duration::milliseconds(remaining_ms),
        })
    }

    fn backend_name(&self) -> &'static str {
        "valkey"
    }
}
