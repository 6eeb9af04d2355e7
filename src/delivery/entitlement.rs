//! Entitlement resolution: may this viewer play paid content of this course?
//!
//! Access can come from several record kinds (enrollment, standalone
//! payment, package purchase, time-limited course grant). They are folded
//! with a logical OR into one [`EntitlementSnapshot`].
//!
//! # Auto-enrollment
//!
//! Resolving a **free** course for a viewer with no active access record
//! creates an active, paid enrollment as a side effect. This is product
//! behavior: opening any lecture of a free course enrolls the viewer. The
//! write is idempotent. When two requests race, the loser's duplicate-key
//! failure counts as "already enrolled"; any other write failure fails the
//! resolution.

use crate::error::{DeliveryError, Result};
use crate::metrics;
use crate::model::{AccessGrant, Course, Enrollment, EntitlementSnapshot};
use crate::store::{DocumentStore, StoreError};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Clone)]
pub struct EntitlementResolver {
    store: Arc<dyn DocumentStore>,
    timeout: Duration,
}

impl EntitlementResolver {
    pub fn new(store: Arc<dyn DocumentStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Resolve the viewer's entitlement in a course the caller already loaded.
    ///
    /// An absent viewer resolves to [`EntitlementSnapshot::DENIED`] without
    /// touching the store. Store failures and timeouts surface as
    /// [`DeliveryError::Unavailable`], never as a denial.
    pub async fn resolve(
        &self,
        viewer_id: Option<&str>,
        course: &Course,
    ) -> Result<EntitlementSnapshot> {
        let Some(viewer_id) = viewer_id else {
            return Ok(EntitlementSnapshot::DENIED);
        };
        let now = Utc::now();

        let enrollment = self
            .bounded(self.store.find_enrollment(viewer_id, &course.id))
            .await?
            .filter(|e| e.is_active_at(now));

        if enrollment.as_ref().is_some_and(|e| e.is_paid) {
            return Ok(EntitlementSnapshot::FULL);
        }

        let mut grants = self
            .bounded(self.store.find_access_grants(viewer_id, &course.id))
            .await?;
        grants.extend(enrollment.map(AccessGrant::Enrollment));

        let snapshot = EntitlementSnapshot::fold(&grants, viewer_id, &course.id, now);
        if snapshot.is_enrolled || !course.is_free() {
            return Ok(snapshot);
        }

        self.auto_enroll(viewer_id, &course.id).await?;
        Ok(EntitlementSnapshot::FULL)
    }

    async fn auto_enroll(&self, viewer_id: &str, course_id: &str) -> Result<()> {
        let enrollment = Enrollment::auto_enrolled(viewer_id, course_id);
        match tokio::time::timeout(self.timeout, self.store.insert_enrollment(enrollment)).await {
            Ok(Ok(())) => {
                info!("Auto-enrolled viewer {} in free course {}", viewer_id, course_id);
                metrics::record_auto_enrollment();
                Ok(())
            }
            Ok(Err(StoreError::DuplicateKey { .. })) => {
                debug!(
                    "Viewer {} already enrolled in {} (concurrent auto-enroll)",
                    viewer_id, course_id
                );
                Ok(())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(self.timed_out()),
        }
    }

    async fn bounded<T>(
        &self,
        operation: impl Future<Output = std::result::Result<T, StoreError>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.timeout, operation).await {
            Ok(result) => result.map_err(DeliveryError::from),
            Err(_) => Err(self.timed_out()),
        }
    }

    fn timed_out(&self) -> DeliveryError {
        DeliveryError::Unavailable(format!("document store timed out after {:?}", self.timeout))
    }
}
