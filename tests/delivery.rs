//! Scenario tests for the delivery path against the library API.

mod common;

use async_trait::async_trait;
use common::{FREE_COURSE, PAID_COURSE, harness, paid_course};
use lectern::cache::MemoryCacheStore;
use lectern::delivery::{DeliveryService, DeliverySettings};
use lectern::error::DeliveryError;
use lectern::model::{AccessGrant, Course, Enrollment, Payment, PaymentStatus};
use lectern::store::{DocumentStore, MemoryStore, StoreError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const CLIENT: &str = "198.51.100.20";

// ── Intro lecture ───────────────────────────────────────────────────────────

#[tokio::test]
async fn intro_lecture_is_open_to_any_signed_in_viewer() {
    let h = harness(DeliverySettings::default()).await;

    for course in [PAID_COURSE, FREE_COURSE] {
        let intro = if course == PAID_COURSE { "intro" } else { "l0" };

        let anonymous = h.service.get_video_url(None, CLIENT, course, intro).await;
        assert!(matches!(anonymous, Err(DeliveryError::Unauthenticated)));

        let entry = h
            .service
            .get_video_url(Some("stranger"), CLIENT, course, intro)
            .await
            .unwrap();
        assert_eq!(entry.lecture.id, intro);
    }

    // The paid course's intro did not enroll anybody
    assert_eq!(h.store.active_enrollment_count("stranger", PAID_COURSE), 0);
}

// ── Free-course auto-enrollment ─────────────────────────────────────────────

#[tokio::test]
async fn free_course_walkthrough() {
    let h = harness(DeliverySettings::default()).await;

    let anonymous = h.service.get_video_url(None, CLIENT, FREE_COURSE, "l0").await;
    assert!(matches!(anonymous, Err(DeliveryError::Unauthenticated)));

    h.service
        .get_video_url(Some("v"), CLIENT, FREE_COURSE, "l0")
        .await
        .unwrap();
    // The intro request alone enrolls the viewer
    assert_eq!(h.store.active_enrollment_count("v", FREE_COURSE), 1);

    h.service
        .get_video_url(Some("v"), CLIENT, FREE_COURSE, "l1")
        .await
        .unwrap();
    assert_eq!(h.store.active_enrollment_count("v", FREE_COURSE), 1);

    // Skipping the intro still works: auto-enroll is keyed on the course
    h.service
        .get_video_url(Some("v2"), CLIENT, FREE_COURSE, "l1")
        .await
        .unwrap();
    assert_eq!(h.store.active_enrollment_count("v2", FREE_COURSE), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_requests_enroll_once() {
    let h = harness(DeliverySettings {
        rate_limit_max: 0,
        ..DeliverySettings::default()
    })
    .await;

    let tasks: Vec<_> = (0..12)
        .map(|i| {
            let service = h.service.clone();
            tokio::spawn(async move {
                service
                    .get_video_url(Some("racer"), &format!("10.0.0.{i}"), FREE_COURSE, "l1")
                    .await
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(h.store.active_enrollment_count("racer", FREE_COURSE), 1);
}

// ── Signed-URL reuse and expiry ─────────────────────────────────────────────

#[tokio::test]
async fn url_is_reused_within_ttl_and_reissued_after() {
    let h = harness(DeliverySettings {
        signed_url_ttl: Duration::from_secs(1),
        ..DeliverySettings::default()
    })
    .await;

    let first = h
        .service
        .get_video_url(Some("v"), CLIENT, PAID_COURSE, "traits")
        .await
        .unwrap();
    let second = h
        .service
        .get_video_url(Some("v"), CLIENT, PAID_COURSE, "traits")
        .await
        .unwrap();
    assert_eq!(first.signed_url, second.signed_url);
    assert_eq!(first.expires_at, second.expires_at);

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let third = h
        .service
        .get_video_url(Some("v"), CLIENT, PAID_COURSE, "traits")
        .await
        .unwrap();
    assert_ne!(third.signed_url, first.signed_url);
    assert!(third.expires_at > first.expires_at);
}

#[tokio::test]
async fn cache_hit_skips_the_catalog() {
    let h = harness(DeliverySettings::default()).await;

    let first = h
        .service
        .get_video_url(Some("v"), CLIENT, PAID_COURSE, "traits")
        .await
        .unwrap();

    // Lecture disappears from the catalog; the cached URL is still served
    let mut course = paid_course();
    course.modules[1].lectures.retain(|l| l.id != "traits");
    h.store.upsert_course(course);

    let cached = h
        .service
        .get_video_url(Some("v"), CLIENT, PAID_COURSE, "traits")
        .await
        .unwrap();
    assert_eq!(cached, first);

    let other_viewer = h
        .service
        .get_video_url(Some("w"), CLIENT, PAID_COURSE, "traits")
        .await;
    assert!(matches!(other_viewer, Err(DeliveryError::NotFound("Lecture"))));
}

// ── Rate limiting ───────────────────────────────────────────────────────────

#[tokio::test]
async fn rate_limit_trips_and_resets() {
    let h = harness(DeliverySettings {
        rate_limit_max: 3,
        rate_limit_window: Duration::from_secs(1),
        ..DeliverySettings::default()
    })
    .await;

    for _ in 0..3 {
        h.service
            .get_video_url(Some("v"), CLIENT, PAID_COURSE, "intro")
            .await
            .unwrap();
    }
    let limited = h
        .service
        .get_video_url(Some("v"), CLIENT, PAID_COURSE, "intro")
        .await;
    assert!(matches!(limited, Err(DeliveryError::RateLimited)));

    tokio::time::sleep(Duration::from_millis(1100)).await;

    h.service
        .get_video_url(Some("v"), CLIENT, PAID_COURSE, "intro")
        .await
        .unwrap();
}

// ── Paid access ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn denied_viewer_gets_in_after_enrollment_and_invalidation() {
    let h = harness(DeliverySettings::default()).await;

    let denied = h
        .service
        .get_video_url(Some("v"), CLIENT, PAID_COURSE, "ownership")
        .await;
    assert!(matches!(denied, Err(DeliveryError::AccessDenied)));

    h.store
        .upsert_enrollment(Enrollment::new("v", PAID_COURSE, true));
    h.service.invalidate_access("v", PAID_COURSE).await;

    let entry = h
        .service
        .get_video_url(Some("v"), CLIENT, PAID_COURSE, "ownership")
        .await
        .unwrap();
    assert_eq!(entry.lecture.id, "ownership");
}

#[tokio::test]
async fn unpaid_viewer_gets_in_after_completed_payment() {
    let h = harness(DeliverySettings::default()).await;
    h.store
        .upsert_enrollment(Enrollment::new("v", PAID_COURSE, false));

    let unpaid = h
        .service
        .get_video_url(Some("v"), CLIENT, PAID_COURSE, "ownership")
        .await;
    assert!(matches!(unpaid, Err(DeliveryError::PaymentRequired)));

    h.store.record_grant(AccessGrant::Payment(Payment {
        viewer_id: "v".to_string(),
        course_id: PAID_COURSE.to_string(),
        status: PaymentStatus::Completed,
    }));
    h.service.invalidate_access("v", PAID_COURSE).await;

    h.service
        .get_video_url(Some("v"), CLIENT, PAID_COURSE, "ownership")
        .await
        .unwrap();
}

#[tokio::test]
async fn batch_resolves_entitlement_once_for_all_lectures() {
    let h = harness(DeliverySettings {
        rate_limit_max: 1,
        ..DeliverySettings::default()
    })
    .await;
    h.store
        .upsert_enrollment(Enrollment::new("v", PAID_COURSE, true));

    let ids: Vec<String> = ["intro", "ownership", "traits", "macros"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let results = h
        .service
        .get_batch(Some("v"), CLIENT, PAID_COURSE, &ids)
        .await
        .unwrap();

    assert!(results["intro"].is_ok());
    assert!(results["ownership"].is_ok());
    assert!(results["traits"].is_ok());
    assert!(matches!(
        results["macros"],
        Err(DeliveryError::NotFound("Lecture video"))
    ));

    // The batch counted as a single request against the limit of one
    let next = h
        .service
        .get_video_url(Some("v"), CLIENT, PAID_COURSE, "intro")
        .await;
    assert!(matches!(next, Err(DeliveryError::RateLimited)));
}

// ── Store failures ──────────────────────────────────────────────────────────

/// Store whose access-record lookups fail while `down` is set.
struct FlakyStore {
    inner: MemoryStore,
    down: AtomicBool,
}

impl FlakyStore {
    fn check(&self) -> Result<(), StoreError> {
        if self.down.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("primary unreachable".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn find_course(&self, course_id: &str) -> Result<Option<Course>, StoreError> {
        self.inner.find_course(course_id).await
    }

    async fn find_enrollment(
        &self,
        viewer_id: &str,
        course_id: &str,
    ) -> Result<Option<Enrollment>, StoreError> {
        self.check()?;
        self.inner.find_enrollment(viewer_id, course_id).await
    }

    async fn find_access_grants(
        &self,
        viewer_id: &str,
        course_id: &str,
    ) -> Result<Vec<AccessGrant>, StoreError> {
        self.check()?;
        self.inner.find_access_grants(viewer_id, course_id).await
    }

    async fn insert_enrollment(&self, enrollment: Enrollment) -> Result<(), StoreError> {
        self.check()?;
        self.inner.insert_enrollment(enrollment).await
    }
}

#[tokio::test]
async fn store_outage_is_not_cached_as_denial() {
    let inner = common::seeded_store();
    inner.upsert_enrollment(Enrollment::new("v", PAID_COURSE, true));
    let store = Arc::new(FlakyStore {
        inner,
        down: AtomicBool::new(true),
    });
    let service = DeliveryService::new(
        store.clone(),
        common::seeded_storage().await,
        Arc::new(MemoryCacheStore::new()),
        DeliverySettings::default(),
    );

    let during = service
        .get_video_url(Some("v"), CLIENT, PAID_COURSE, "ownership")
        .await;
    assert!(matches!(during, Err(DeliveryError::Unavailable(_))));

    store.down.store(false, Ordering::SeqCst);

    service
        .get_video_url(Some("v"), CLIENT, PAID_COURSE, "ownership")
        .await
        .unwrap();
}

#[tokio::test]
async fn free_intro_plays_through_store_outage() {
    let store = Arc::new(FlakyStore {
        inner: common::seeded_store(),
        down: AtomicBool::new(true),
    });
    let service = DeliveryService::new(
        store.clone(),
        common::seeded_storage().await,
        Arc::new(MemoryCacheStore::new()),
        DeliverySettings::default(),
    );

    // Auto-enrollment fails but the intro is not gated on it
    service
        .get_video_url(Some("v"), CLIENT, FREE_COURSE, "l0")
        .await
        .unwrap();
    assert_eq!(store.inner.active_enrollment_count("v", FREE_COURSE), 0);

    // Non-intro lectures still need the resolver
    let during = service
        .get_video_url(Some("v"), CLIENT, FREE_COURSE, "l1")
        .await;
    assert!(matches!(during, Err(DeliveryError::Unavailable(_))));

    store.down.store(false, Ordering::SeqCst);
    service
        .get_video_url(Some("v"), CLIENT, FREE_COURSE, "l1")
        .await
        .unwrap();
    assert_eq!(store.inner.active_enrollment_count("v", FREE_COURSE), 1);
}
