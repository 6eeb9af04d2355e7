//! Course catalog and access records as persisted by the document store,
//! plus the derived snapshots cached by the delivery path.
//!
//! Field names follow the platform's JSON documents (camelCase), so these
//! types double as the seed-catalog format and the HTTP response shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A course with its module → lecture tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub is_free: bool,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub modules: Vec<Module>,
}

impl Course {
    /// A course is free when flagged as such or priced at zero.
    pub fn is_free(&self) -> bool {
        self.is_free || self.price <= 0.0
    }

    pub fn is_paid(&self) -> bool {
        !self.is_free()
    }

    /// Find a lecture anywhere in the module tree, keeping its position.
    pub fn locate_lecture(&self, lecture_id: &str) -> Option<LocatedLecture<'_>> {
        self.modules
            .iter()
            .enumerate()
            .find_map(|(module_index, module)| {
                module
                    .lectures
                    .iter()
                    .position(|lecture| lecture.id == lecture_id)
                    .map(|lecture_index| LocatedLecture {
                        lecture: &module.lectures[lecture_index],
                        module_index,
                        lecture_index,
                    })
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub lectures: Vec<Lecture>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Lecture {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub is_preview: bool,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub video_content: Option<VideoContent>,
}

impl Lecture {
    /// Object-storage key of the lecture video, if one was uploaded.
    pub fn storage_key(&self) -> Option<&str> {
        self.video_content
            .as_ref()
            .and_then(|content| content.r2_key.as_deref())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn summary(&self) -> LectureSummary {
        LectureSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            is_preview: self.is_preview,
        }
    }
}

/// Reference to a lecture's video in object storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoContent {
    #[serde(default)]
    pub r2_key: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// A lecture together with its position in the course tree.
#[derive(Debug, Clone, Copy)]
pub struct LocatedLecture<'a> {
    pub lecture: &'a Lecture,
    pub module_index: usize,
    pub lecture_index: usize,
}

impl LocatedLecture<'_> {
    /// First lecture of the first module. Always playable; this is a
    /// platform rule, not a per-course setting.
    pub fn is_intro(&self) -> bool {
        self.module_index == 0 && self.lecture_index == 0
    }

    /// Intro and preview lectures play without an entitlement check.
    pub fn is_freely_playable(&self) -> bool {
        self.is_intro() || self.lecture.is_preview
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Active,
    Cancelled,
}

/// Enrollment of one viewer in one course. At most one active record
/// exists per (viewer, course) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub viewer_id: String,
    pub course_id: String,
    pub status: EnrollmentStatus,
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default)]
    pub access_expires_at: Option<DateTime<Utc>>,
    #[serde(default = "chrono::Utc::now")]
    pub enrolled_at: DateTime<Utc>,
}

impl Enrollment {
    pub fn new(viewer_id: impl Into<String>, course_id: impl Into<String>, is_paid: bool) -> Self {
        Self {
            viewer_id: viewer_id.into(),
            course_id: course_id.into(),
            status: EnrollmentStatus::Active,
            is_paid,
            access_expires_at: None,
            enrolled_at: Utc::now(),
        }
    }

    /// Record created implicitly the first time a viewer opens a free course.
    pub fn auto_enrolled(viewer_id: &str, course_id: &str) -> Self {
        Self::new(viewer_id, course_id, true)
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == EnrollmentStatus::Active
            && self.access_expires_at.is_none_or(|expires| expires > now)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    /// Pending and completed payments keep the viewer enrolled.
    fn grants_access(self) -> bool {
        matches!(self, Self::Pending | Self::Completed)
    }
}

/// Standalone payment for a single course.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub viewer_id: String,
    pub course_id: String,
    pub status: PaymentStatus,
}

/// Purchase of a package bundling several courses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackagePurchase {
    pub viewer_id: String,
    pub package_id: String,
    pub course_ids: Vec<String>,
    pub status: PaymentStatus,
}

/// Time-limited access to a course granted directly to a viewer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CourseGrant {
    pub viewer_id: String,
    pub course_id: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Every record kind that can open a course to a viewer.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessGrant {
    Enrollment(Enrollment),
    Payment(Payment),
    Package(PackagePurchase),
    CourseGrant(CourseGrant),
}

impl AccessGrant {
    pub fn is_active_for(&self, viewer_id: &str, course_id: &str, now: DateTime<Utc>) -> bool {
        match self {
            Self::Enrollment(e) => {
                e.viewer_id == viewer_id && e.course_id == course_id && e.is_active_at(now)
            }
            Self::Payment(p) => {
                p.viewer_id == viewer_id && p.course_id == course_id && p.status.grants_access()
            }
            Self::Package(p) => {
                p.viewer_id == viewer_id
                    && p.course_ids.iter().any(|id| id == course_id)
                    && p.status.grants_access()
            }
            Self::CourseGrant(g) => {
                g.viewer_id == viewer_id
                    && g.course_id == course_id
                    && g.expires_at.is_none_or(|expires| expires > now)
            }
        }
    }

    pub fn is_paid(&self) -> bool {
        match self {
            Self::Enrollment(e) => e.is_paid,
            Self::Payment(p) => p.status == PaymentStatus::Completed,
            Self::Package(p) => p.status == PaymentStatus::Completed,
            // Grants are issued by the purchase workflow once it settles.
            Self::CourseGrant(_) => true,
        }
    }
}

/// Derived view of a viewer's rights in one course. Cached, never persisted.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementSnapshot {
    pub is_enrolled: bool,
    pub is_paid: bool,
}

impl EntitlementSnapshot {
    pub const DENIED: Self = Self {
        is_enrolled: false,
        is_paid: false,
    };

    pub const FULL: Self = Self {
        is_enrolled: true,
        is_paid: true,
    };

    /// OR together every grant that is active for the pair.
    pub fn fold<'a>(
        grants: impl IntoIterator<Item = &'a AccessGrant>,
        viewer_id: &str,
        course_id: &str,
        now: DateTime<Utc>,
    ) -> Self {
        grants
            .into_iter()
            .filter(|grant| grant.is_active_for(viewer_id, course_id, now))
            .fold(Self::DENIED, |acc, grant| Self {
                is_enrolled: true,
                is_paid: acc.is_paid || grant.is_paid(),
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LectureSummary {
    pub id: String,
    pub title: String,
    pub is_preview: bool,
}

/// A signed playback URL scoped to one (viewer, course, lecture) triple.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignedUrlEntry {
    pub signed_url: String,
    pub expires_at: DateTime<Utc>,
    pub lecture: LectureSummary,
}
