//! Signed-URL cache per (viewer, course, lecture).
//!
//! Collapses player retries, seeks and extra tabs onto one storage
//! round-trip. Entries are personal: the entitlement check that gated the
//! issuance was viewer-specific, so two viewers never share a URL even for
//! the same object.

use crate::cache::{CacheStore, cache_key};
use crate::metrics;
use crate::model::SignedUrlEntry;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Clone)]
pub struct SignedUrlCache {
    store: Arc<dyn CacheStore>,
    /// Upper bound; an entry never outlives its URL's own expiry.
    ttl: Duration,
}

impl SignedUrlCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    fn key(viewer_id: &str, course_id: &str, lecture_id: &str) -> String {
        cache_key("signed-url", &[viewer_id, course_id, lecture_id])
    }

    /// Return a cached entry whose URL has not yet expired.
    pub async fn get(
        &self,
        viewer_id: &str,
        course_id: &str,
        lecture_id: &str,
    ) -> Option<SignedUrlEntry> {
        let cached = match self
            .store
            .get(&Self::key(viewer_id, course_id, lecture_id))
            .await
        {
            Ok(cached) => cached,
            Err(e) => {
                warn!("Signed URL cache read failed, issuing fresh: {}", e);
                None
            }
        };
        let entry = cached
            .and_then(|json| serde_json::from_str::<SignedUrlEntry>(&json).ok())
            .filter(|entry| entry.expires_at > Utc::now());
        metrics::record_cache_lookup("signed_url", entry.is_some());
        entry
    }

    pub async fn put(
        &self,
        viewer_id: &str,
        course_id: &str,
        lecture_id: &str,
        entry: &SignedUrlEntry,
    ) {
        let Ok(remaining) = (entry.expires_at - Utc::now()).to_std() else {
            // Already expired
            return;
        };
        let ttl = remaining.min(self.ttl);
        if ttl.is_zero() {
            return;
        }
        let Ok(json) = serde_json::to_string(entry) else {
            return;
        };
        if let Err(e) = self
            .store
            .put(&Self::key(viewer_id, course_id, lecture_id), json, ttl)
            .await
        {
            warn!("Signed URL cache write failed: {}", e);
        }
    }
}
