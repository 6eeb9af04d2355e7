//! In-process document store, optionally seeded from a JSON catalog.

use super::{DocumentStore, StoreError};
use crate::model::{AccessGrant, Course, CourseGrant, Enrollment, EnrollmentStatus, PackagePurchase, Payment};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Seed data for [`MemoryStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    #[serde(default)]
    pub courses: Vec<Course>,
    #[serde(default)]
    pub enrollments: Vec<Enrollment>,
    #[serde(default)]
    pub payments: Vec<Payment>,
    #[serde(default)]
    pub package_purchases: Vec<PackagePurchase>,
    #[serde(default)]
    pub course_grants: Vec<CourseGrant>,
}

type PairKey = (String, String);

fn pair(viewer_id: &str, course_id: &str) -> PairKey {
    (viewer_id.to_string(), course_id.to_string())
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    courses: Arc<DashMap<String, Course>>,
    /// One record per (viewer, course): the unique index.
    enrollments: Arc<DashMap<PairKey, Enrollment>>,
    /// Secondary access records keyed by viewer.
    grants: Arc<DashMap<String, Vec<AccessGrant>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_catalog(catalog: Catalog) -> Self {
        let store = Self::new();
        for course in catalog.courses {
            store.upsert_course(course);
        }
        for enrollment in catalog.enrollments {
            store.upsert_enrollment(enrollment);
        }
        for payment in catalog.payments {
            store.record_grant(AccessGrant::Payment(payment));
        }
        for purchase in catalog.package_purchases {
            store.record_grant(AccessGrant::Package(purchase));
        }
        for grant in catalog.course_grants {
            store.record_grant(AccessGrant::CourseGrant(grant));
        }
        store
    }

    /// Load a JSON [`Catalog`] from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StoreError::InvalidCatalog(format!("{}: {}", path.display(), e)))?;
        let catalog: Catalog = serde_json::from_str(&raw)
            .map_err(|e| StoreError::InvalidCatalog(format!("{}: {}", path.display(), e)))?;
        info!(
            "Loaded catalog from {}: {} courses, {} enrollments",
            path.display(),
            catalog.courses.len(),
            catalog.enrollments.len()
        );
        Ok(Self::from_catalog(catalog))
    }

    pub fn upsert_course(&self, course: Course) {
        self.courses.insert(course.id.clone(), course);
    }

    /// Insert or replace the enrollment for its pair, bypassing the
    /// uniqueness check. Used by seeding and by enrollment workflows.
    pub fn upsert_enrollment(&self, enrollment: Enrollment) {
        self.enrollments
            .insert(pair(&enrollment.viewer_id, &enrollment.course_id), enrollment);
    }

    pub fn record_grant(&self, grant: AccessGrant) {
        let viewer_id = match &grant {
            AccessGrant::Enrollment(e) => {
                // Enrollments live in the unique index
                self.upsert_enrollment(e.clone());
                return;
            }
            AccessGrant::Payment(p) => p.viewer_id.clone(),
            AccessGrant::Package(p) => p.viewer_id.clone(),
            AccessGrant::CourseGrant(g) => g.viewer_id.clone(),
        };
        self.grants.entry(viewer_id).or_default().push(grant);
    }

    pub fn active_enrollment_count(&self, viewer_id: &str, course_id: &str) -> usize {
        self.enrollments
            .get(&pair(viewer_id, course_id))
            .filter(|e| e.status == EnrollmentStatus::Active)
            .map_or(0, |_| 1)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_course(&self, course_id: &str) -> Result<Option<Course>, StoreError> {
        Ok(self.courses.get(course_id).map(|c| c.clone()))
    }

    async fn find_enrollment(
        &self,
        viewer_id: &str,
        course_id: &str,
    ) -> Result<Option<Enrollment>, StoreError> {
        Ok(self
            .enrollments
            .get(&pair(viewer_id, course_id))
            .map(|e| e.clone()))
    }

    async fn find_access_grants(
        &self,
        viewer_id: &str,
        course_id: &str,
    ) -> Result<Vec<AccessGrant>, StoreError> {
        let Some(grants) = self.grants.get(viewer_id) else {
            return Ok(Vec::new());
        };
        Ok(grants
            .iter()
            .filter(|grant| match grant {
                AccessGrant::Enrollment(e) => e.course_id == course_id,
                AccessGrant::Payment(p) => p.course_id == course_id,
                AccessGrant::Package(p) => p.course_ids.iter().any(|id| id == course_id),
                AccessGrant::CourseGrant(g) => g.course_id == course_id,
            })
            .cloned()
            .collect())
    }

    async fn insert_enrollment(&self, enrollment: Enrollment) -> Result<(), StoreError> {
        match self
            .enrollments
            .entry(pair(&enrollment.viewer_id, &enrollment.course_id))
        {
            Entry::Occupied(existing) if existing.get().status == EnrollmentStatus::Active => {
                Err(StoreError::DuplicateKey {
                    viewer_id: enrollment.viewer_id,
                    course_id: enrollment.course_id,
                })
            }
            Entry::Occupied(mut cancelled) => {
                cancelled.insert(enrollment);
                Ok(())
            }
            Entry::Vacant(slot) => {
                slot.insert(enrollment);
                Ok(())
            }
        }
    }
}
