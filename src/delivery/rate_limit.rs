//! Per-viewer, per-client rate limiting of signed-URL issuance.
//!
//! Fixed-window counter keyed by (viewer, client address). Blunts scripts
//! that mint fresh signed URLs in a loop to redistribute them, while leaving
//! room for normal player retries.

use crate::cache::{CacheStore, cache_key};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CacheStore>,
    /// Max requests per window; 0 disables limiting
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CacheStore>, limit: u32, window: Duration) -> Self {
        Self {
            store,
            limit,
            window,
        }
    }

    fn key(viewer_id: &str, client_address: &str) -> String {
        cache_key("rate", &[viewer_id, client_address])
    }

    /// Check whether another request from this viewer and client is allowed.
    /// Returns `true` if under limit, `false` if rate-limited.
    ///
    /// A failing cache backend lets the request through; the limiter guards
    /// against abuse and must not take playback down with it.
    pub async fn allow(&self, viewer_id: &str, client_address: &str) -> bool {
        if self.limit == 0 {
            return true;
        }

        match self
            .store
            .increment(&Self::key(viewer_id, client_address), self.window)
            .await
        {
            Ok(window) => window.count <= u64::from(self.limit),
            Err(e) => {
                warn!("Rate limiter backend failed, allowing request: {}", e);
                true
            }
        }
    }
}
