//! Short-TTL cache of entitlement snapshots per (viewer, course).
//!
//! Denied snapshots are cached too; enrollment and payment workflows call
//! [`AccessDecisionCache::invalidate`] so fresh access shows up immediately.
//! Resolver failures are never cached.

use crate::cache::{CacheStore, cache_key};
use crate::metrics;
use crate::model::EntitlementSnapshot;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct AccessDecisionCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl AccessDecisionCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    fn key(viewer_id: &str, course_id: &str) -> String {
        cache_key("access", &[viewer_id, course_id])
    }

    pub async fn get(&self, viewer_id: &str, course_id: &str) -> Option<EntitlementSnapshot> {
        let cached = match self.store.get(&Self::key(viewer_id, course_id)).await {
            Ok(cached) => cached,
            Err(e) => {
                warn!("Access cache read failed, resolving fresh: {}", e);
                None
            }
        };
        let snapshot = cached.and_then(|json| serde_json::from_str(&json).ok());
        metrics::record_cache_lookup("access", snapshot.is_some());
        snapshot
    }

    pub async fn put(&self, viewer_id: &str, course_id: &str, snapshot: EntitlementSnapshot) {
        let Ok(json) = serde_json::to_string(&snapshot) else {
            return;
        };
        if let Err(e) = self
            .store
            .put(&Self::key(viewer_id, course_id), json, self.ttl)
            .await
        {
            warn!("Access cache write failed: {}", e);
        }
    }

    /// Drop the cached decision so the next request re-resolves.
    pub async fn invalidate(&self, viewer_id: &str, course_id: &str) {
        debug!("Invalidating access for viewer {} in course {}", viewer_id, course_id);
        if let Err(e) = self.store.invalidate(&Self::key(viewer_id, course_id)).await {
            warn!("Access cache invalidation failed: {}", e);
        }
    }
}
