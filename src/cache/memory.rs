//! In-process cache backend.
//!
//! Values and rate windows live in `DashMap`s with wall-clock expiry.
//! Expired values are dropped lazily on read and by the periodic sweep.

use super::{CacheError, CacheStore, RateWindow};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
struct CachedEntry {
    value: String,
    expires_at: Instant,
}

#[derive(Clone, Copy, Debug)]
struct Counter {
    count: u64,
    window_start: Instant,
    window: Duration,
}

impl Counter {
    fn is_expired(&self) -> bool {
        self.window_start.elapsed() >= self.window
    }
}

/// Thread-safe TTL map plus fixed-window counters.
#[derive(Clone, Debug, Default)]
pub struct MemoryCacheStore {
    entries: Arc<DashMap<String, CachedEntry>>,
    counters: Arc<DashMap<String, Counter>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values, live or not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > Instant::now() {
                return Ok(Some(entry.value.clone()));
            }
            // Stale; release the read guard before removing
            drop(entry);
            self.entries
                .remove_if(key, |_, entry| entry.expires_at <= Instant::now());
        }
        Ok(None)
    }

    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(
            key.to_string(),
            CachedEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn increment(&self, key: &str, window: Duration) -> Result<RateWindow, CacheError> {
        let now = Instant::now();
        let mut counter = self.counters.entry(key.to_string()).or_insert(Counter {
            count: 0,
            window_start: now,
            window,
        });

        // Reset window if expired
        if counter.is_expired() {
            counter.count = 0;
            counter.window_start = now;
            counter.window = window;
        }

        counter.count += 1;
        let remaining = counter.window.saturating_sub(counter.window_start.elapsed());
        let window_reset_at = Utc::now()
            + chrono::Duration::from_std(remaining).unwrap_or_else(|_| chrono::Duration::zero());

        Ok(RateWindow {
            count: counter.count,
            window_reset_at,
        })
    }

    async fn sweep(&self) -> usize {
        let before = self.entries.len() + self.counters.len();
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
        self.counters.retain(|_, counter| !counter.is_expired());
        before.saturating_sub(self.entries.len() + self.counters.len())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
