//! Document-store capability: course lookup, enrollment records and the
//! secondary access records (payments, package purchases, course grants).

pub mod memory;

use crate::model::{AccessGrant, Course, Enrollment};
use async_trait::async_trait;

pub use memory::{Catalog, MemoryStore};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Unique (viewer, course) constraint on active enrollments.
    #[error("Enrollment already exists for viewer {viewer_id} in course {course_id}")]
    DuplicateKey { viewer_id: String, course_id: String },

    #[error("Document store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_course(&self, course_id: &str) -> Result<Option<Course>, StoreError>;

    /// The enrollment record for the pair, whatever its status.
    async fn find_enrollment(
        &self,
        viewer_id: &str,
        course_id: &str,
    ) -> Result<Option<Enrollment>, StoreError>;

    /// Secondary records (payments, package purchases, course grants) that
    /// mention the pair. Callers decide which are currently active.
    async fn find_access_grants(
        &self,
        viewer_id: &str,
        course_id: &str,
    ) -> Result<Vec<AccessGrant>, StoreError>;

    /// Insert an enrollment, failing with [`StoreError::DuplicateKey`] when an
    /// active one already exists for the pair. A cancelled record is replaced.
    async fn insert_enrollment(&self, enrollment: Enrollment) -> Result<(), StoreError>;
}
