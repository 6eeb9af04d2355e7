//! Key/value cache capability shared by the access-decision cache, the
//! signed-URL cache and the rate limiter.
//!
//! Values are opaque strings (the typed caches store JSON). The in-process
//! backend is always available; the Valkey backend is behind the `valkey`
//! feature and keeps counters and cached URLs consistent across instances.

pub mod memory;
#[cfg(feature = "valkey")]
pub mod valkey;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub use memory::MemoryCacheStore;
#[cfg(feature = "valkey")]
pub use valkey::ValkeyCacheStore;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),
}

/// Fixed-window request counter for one rate-limit key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    /// Requests seen in the current window, including this one.
    pub count: u64,
    pub window_reset_at: DateTime<Utc>,
}

/// Storage backend for every short-lived cache in the delivery path.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a live value. Expired entries behave as missing.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` under `key` for `ttl`, replacing any previous value.
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Drop `key` immediately.
    async fn invalidate(&self, key: &str) -> Result<(), CacheError>;

    /// Count one hit against a fixed window of length `window`. A new
    /// window starts with the first hit after the previous one expired.
    async fn increment(&self, key: &str, window: Duration) -> Result<RateWindow, CacheError>;

    /// Evict expired entries, returning how many were removed.
    ///
    /// Default: no-op, for backends with native expiry.
    async fn sweep(&self) -> usize {
        0
    }

    /// Short backend name for health output and logs.
    fn backend_name(&self) -> &'static str;
}

/// Build a cache key from a prefix and id segments joined with `:`.
///
/// `%` and `:` inside a segment are percent-encoded, so ids that contain
/// the separator cannot collide with a different split of the same text.
pub fn cache_key(prefix: &str, segments: &[&str]) -> String {
    let mut key = String::from(prefix);
    for segment in segments {
        key.push(':');
        for c in segment.chars() {
            match c {
                '%' => key.push_str("%25"),
                ':' => key.push_str("%3A"),
                c => key.push(c),
            }
        }
    }
    key
}

/// Run [`CacheStore::sweep`] every `every` until `shutdown` fires.
pub fn spawn_sweeper(
    cache: Arc<dyn CacheStore>,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // First tick completes immediately; nothing to sweep yet.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Cache sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let removed = cache.sweep().await;
                    if removed > 0 {
                        debug!("Cache sweep evicted {} entries", removed);
                    }
                }
            }
        }
    })
}
