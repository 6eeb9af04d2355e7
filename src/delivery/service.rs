//! Playback URL orchestration.
//!
//! One request walks these steps in order, stopping at the first that
//! decides the outcome:
//!
//! 1. no viewer → `Unauthenticated`
//! 2. rate limiter → `RateLimited`
//! 3. signed-URL cache hit → return it (no store or storage round-trip)
//! 4. load course, locate lecture → `NotFound`
//! 5. intro or preview lecture → skip the entitlement check (free courses
//!    still resolve once so the viewer is auto-enrolled)
//! 6. access cache / resolver → `AccessDenied` or `PaymentRequired`
//! 7. issue signed URL → `Storage`
//! 8. populate the signed-URL cache
//!
//! Rate-limited requests touch no cache. Concurrent misses for the same key
//! may both issue a URL; the last write wins and both URLs are valid.

use super::{
    access_cache::AccessDecisionCache,
    entitlement::EntitlementResolver,
    issuer::{DEFAULT_SIGNED_URL_TTL, SignedUrlIssuer},
    rate_limit::RateLimiter,
    url_cache::SignedUrlCache,
};
use crate::cache::CacheStore;
use crate::config::Config;
use crate::error::{DeliveryError, Result};
use crate::metrics;
use crate::model::{Course, EntitlementSnapshot, SignedUrlEntry};
use crate::storage::ObjectStorage;
use crate::store::DocumentStore;
use futures_util::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Tunables of the delivery path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliverySettings {
    pub signed_url_ttl: Duration,
    pub access_ttl: Duration,
    /// 0 disables rate limiting
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
    pub upstream_timeout: Duration,
    pub max_batch_lectures: usize,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            signed_url_ttl: DEFAULT_SIGNED_URL_TTL,
            access_ttl: Duration::from_secs(180),
            rate_limit_max: 10,
            rate_limit_window: Duration::from_secs(60),
            upstream_timeout: Duration::from_secs(8),
            max_batch_lectures: 50,
        }
    }
}

impl From<&Config> for DeliverySettings {
    fn from(config: &Config) -> Self {
        Self {
            signed_url_ttl: Duration::from_secs(config.signed_url_ttl_secs),
            access_ttl: Duration::from_secs(config.access_cache_ttl_secs),
            rate_limit_max: config.rate_limit_max_requests,
            rate_limit_window: Duration::from_secs(config.rate_limit_window_secs),
            upstream_timeout: Duration::from_secs(config.upstream_timeout_secs),
            max_batch_lectures: config.max_batch_lectures,
        }
    }
}

/// Per-lecture outcomes of a batch request, keyed by lecture id.
pub type BatchResults = BTreeMap<String, Result<SignedUrlEntry>>;

#[derive(Clone)]
pub struct DeliveryService {
    store: Arc<dyn DocumentStore>,
    rate_limiter: RateLimiter,
    url_cache: SignedUrlCache,
    access_cache: AccessDecisionCache,
    resolver: EntitlementResolver,
    issuer: SignedUrlIssuer,
    settings: DeliverySettings,
}

impl DeliveryService {
    /// Wire the delivery path over its three capabilities. All caches and
    /// the rate limiter share `cache`, under distinct key prefixes.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        storage: Arc<dyn ObjectStorage>,
        cache: Arc<dyn CacheStore>,
        settings: DeliverySettings,
    ) -> Self {
        Self {
            rate_limiter: RateLimiter::new(
                cache.clone(),
                settings.rate_limit_max,
                settings.rate_limit_window,
            ),
            url_cache: SignedUrlCache::new(cache.clone(), settings.signed_url_ttl),
            access_cache: AccessDecisionCache::new(cache, settings.access_ttl),
            resolver: EntitlementResolver::new(store.clone(), settings.upstream_timeout),
            issuer: SignedUrlIssuer::new(
                storage,
                settings.signed_url_ttl,
                settings.upstream_timeout,
            ),
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &DeliverySettings {
        &self.settings
    }

    /// Signed playback URL for one lecture.
    pub async fn get_video_url(
        &self,
        viewer_id: Option<&str>,
        client_address: &str,
        course_id: &str,
        lecture_id: &str,
    ) -> Result<SignedUrlEntry> {
        let viewer_id = viewer_id.ok_or(DeliveryError::Unauthenticated)?;
        self.check_rate(viewer_id, client_address).await?;

        if let Some(entry) = self.url_cache.get(viewer_id, course_id, lecture_id).await {
            debug!("Signed URL cache hit: {}/{}/{}", viewer_id, course_id, lecture_id);
            return Ok(entry);
        }

        let course = self.load_course(course_id).await?;
        self.deliver(viewer_id, &course, lecture_id, &OnceCell::new())
            .await
    }

    /// Signed URLs for several lectures of one course.
    ///
    /// Costs one rate-limit hit and at most one entitlement resolution.
    /// Duplicate ids collapse. A missing course fails the whole batch;
    /// per-lecture failures (unknown lecture, denial, storage) are
    /// reported per id.
    pub async fn get_batch(
        &self,
        viewer_id: Option<&str>,
        client_address: &str,
        course_id: &str,
        lecture_ids: &[String],
    ) -> Result<BatchResults> {
        let viewer_id = viewer_id.ok_or(DeliveryError::Unauthenticated)?;

        let unique: BTreeSet<&str> = lecture_ids.iter().map(String::as_str).collect();
        if unique.is_empty() {
            return Err(DeliveryError::InvalidRequest(
                "lectureIds must not be empty".to_string(),
            ));
        }
        if unique.len() > self.settings.max_batch_lectures {
            return Err(DeliveryError::InvalidRequest(format!(
                "at most {} lectures per batch",
                self.settings.max_batch_lectures
            )));
        }

        self.check_rate(viewer_id, client_address).await?;

        let cached = join_all(unique.iter().map(|lecture_id| async move {
            let entry = self.url_cache.get(viewer_id, course_id, lecture_id).await;
            (*lecture_id, entry)
        }))
        .await;

        let mut results = BatchResults::new();
        let mut misses = Vec::new();
        for (lecture_id, entry) in cached {
            match entry {
                Some(entry) => {
                    results.insert(lecture_id.to_string(), Ok(entry));
                }
                None => misses.push(lecture_id),
            }
        }
        if misses.is_empty() {
            return Ok(results);
        }

        let course = self.load_course(course_id).await?;
        let entitlement = OnceCell::new();
        let issued = join_all(misses.into_iter().map(|lecture_id| {
            let course = &course;
            let entitlement = &entitlement;
            async move {
                let result = self
                    .deliver(viewer_id, course, lecture_id, entitlement)
                    .await;
                (lecture_id.to_string(), result)
            }
        }))
        .await;
        results.extend(issued);

        Ok(results)
    }

    /// Drop the cached access decision for the pair. Called by enrollment
    /// and payment workflows when access changes.
    pub async fn invalidate_access(&self, viewer_id: &str, course_id: &str) {
        self.access_cache.invalidate(viewer_id, course_id).await;
    }

    async fn check_rate(&self, viewer_id: &str, client_address: &str) -> Result<()> {
        if self.rate_limiter.allow(viewer_id, client_address).await {
            return Ok(());
        }
        info!("Rate limited viewer {} from {}", viewer_id, client_address);
        metrics::record_rate_limited();
        Err(DeliveryError::RateLimited)
    }

    async fn load_course(&self, course_id: &str) -> Result<Course> {
        let timeout = self.settings.upstream_timeout;
        match tokio::time::timeout(timeout, self.store.find_course(course_id)).await {
            Ok(Ok(Some(course))) => Ok(course),
            Ok(Ok(None)) => Err(DeliveryError::NotFound("Course")),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(DeliveryError::Unavailable(format!(
                "course lookup timed out after {timeout:?}"
            ))),
        }
    }

    /// Steps 4-8 for a course already in hand. `entitlement` memoizes the
    /// snapshot across the lectures of one request.
    async fn deliver(
        &self,
        viewer_id: &str,
        course: &Course,
        lecture_id: &str,
        entitlement: &OnceCell<EntitlementSnapshot>,
    ) -> Result<SignedUrlEntry> {
        let located = course
            .locate_lecture(lecture_id)
            .ok_or(DeliveryError::NotFound("Lecture"))?;

        if !located.is_freely_playable() {
            let snapshot = *entitlement
                .get_or_try_init(|| self.entitlement(viewer_id, course))
                .await?;
            if !snapshot.is_enrolled {
                return Err(DeliveryError::AccessDenied);
            }
            if course.is_paid() && !snapshot.is_paid {
                return Err(DeliveryError::PaymentRequired);
            }
        } else if course.is_free() {
            // Resolve for the auto-enrollment only; playback does not depend on it
            if let Err(e) = entitlement
                .get_or_try_init(|| self.entitlement(viewer_id, course))
                .await
            {
                warn!(
                    "Auto-enrollment check failed for {} in {}: {}",
                    viewer_id, course.id, e
                );
            }
        }

        let storage_key = located
            .lecture
            .storage_key()
            .ok_or(DeliveryError::NotFound("Lecture video"))?;
        let issued = self.issuer.issue(storage_key).await?;

        let entry = SignedUrlEntry {
            signed_url: issued.url,
            expires_at: issued.expires_at,
            lecture: located.lecture.summary(),
        };
        self.url_cache
            .put(viewer_id, &course.id, lecture_id, &entry)
            .await;
        Ok(entry)
    }

    async fn entitlement(&self, viewer_id: &str, course: &Course) -> Result<EntitlementSnapshot> {
        if let Some(snapshot) = self.access_cache.get(viewer_id, &course.id).await {
            return Ok(snapshot);
        }
        let snapshot = self.resolver.resolve(Some(viewer_id), course).await?;
        self.access_cache.put(viewer_id, &course.id, snapshot).await;
        Ok(snapshot)
    }
}
