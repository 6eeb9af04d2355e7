//! Object-storage capability: upload, inspect, presign and delete objects.

pub mod memory;
#[cfg(feature = "s3")]
pub mod s3;

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

pub use memory::{MediaError, MediaObject, MemoryStorage};
#[cfg(feature = "s3")]
pub use s3::{S3Settings, S3Storage};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Storage configuration error: {0}")]
    Configuration(String),

    #[error("Storage provider error: {0}")]
    Provider(String),

    #[error("Storage request timed out after {0:?}")]
    Timeout(Duration),
}

/// Result of a metadata lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub content_type: Option<String>,
    pub content_length: u64,
    pub metadata: HashMap<String, String>,
}

/// Trait for object-storage providers
///
/// Implementations wrap a bucket (S3, R2, or the in-process store used in
/// development). Presigning does not imply the object exists; callers that
/// need that guarantee check with [`ObjectStorage::head_object`] first.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        metadata: HashMap<String, String>,
    ) -> Result<(), StorageError>;

    /// Fetch object metadata, or [`StorageError::NotFound`].
    async fn head_object(&self, key: &str) -> Result<ObjectMetadata, StorageError>;

    /// Issue a time-limited signed GET URL for `key`.
    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String, StorageError>;

    async fn delete_object(&self, key: &str) -> Result<(), StorageError>;

    /// Short backend name for health output and logs.
    fn backend_name(&self) -> &'static str;
}
