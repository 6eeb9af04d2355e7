//! In-process object store for development and tests.
//!
//! Presigned URLs point at `{base_url}/media/{key}` and carry the expiry and
//! a per-issuance token, so every issuance yields a distinct URL just like a
//! real provider's signature would. The server's `/media` route hands the
//! bytes back through [`MemoryStorage::open`], which honours both.

use super::{ObjectMetadata, ObjectStorage, StorageError};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use url::Url;

#[derive(Clone, Debug)]
struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
    metadata: HashMap<String, String>,
}

/// Issued tokens kept before expired ones are pruned on the next issuance.
const ISSUED_PRUNE_THRESHOLD: usize = 10_000;

/// Why a presigned URL was refused by [`MemoryStorage::open`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    #[error("Unknown object")]
    NotFound,
    #[error("URL expired")]
    Expired,
    #[error("URL token does not match")]
    InvalidToken,
}

/// Object bytes served through a presigned URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Clone, Debug)]
pub struct MemoryStorage {
    objects: Arc<DashMap<String, StoredObject>>,
    /// token -> (key, expires unix seconds)
    issued: Arc<DashMap<String, (String, i64)>>,
    base_url: Url,
    sequence: Arc<AtomicU64>,
}

impl MemoryStorage {
    /// Create an empty store whose URLs are rooted at `base_url`.
    pub fn new(base_url: &str) -> Result<Self, StorageError> {
        let parsed = Url::parse(base_url)
            .map_err(|e| StorageError::Configuration(format!("Invalid base URL {base_url}: {e}")))?;
        if parsed.cannot_be_a_base() {
            return Err(StorageError::Configuration(format!(
                "Base URL cannot carry a path: {base_url}"
            )));
        }
        Ok(Self {
            objects: Arc::new(DashMap::new()),
            issued: Arc::new(DashMap::new()),
            base_url: parsed,
            sequence: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Resolve a presigned URL's path key and query back to the object.
    ///
    /// The token must have been issued for `key` with the same `expires`,
    /// and `expires` must not have passed.
    pub fn open(&self, key: &str, expires: i64, token: &str) -> Result<MediaObject, MediaError> {
        let valid = self
            .issued
            .get(token)
            .is_some_and(|issued| issued.0 == key && issued.1 == expires);
        if !valid {
            return Err(MediaError::InvalidToken);
        }
        if expires < Utc::now().timestamp() {
            return Err(MediaError::Expired);
        }
        self.objects
            .get(key)
            .map(|object| MediaObject {
                bytes: object.bytes.clone(),
                content_type: object.content_type.clone(),
            })
            .ok_or(MediaError::NotFound)
    }

    fn remember(&self, token: String, key: &str, expires: i64) {
        if self.issued.len() >= ISSUED_PRUNE_THRESHOLD {
            let now = Utc::now().timestamp();
            self.issued.retain(|_, (_, exp)| *exp >= now);
        }
        self.issued.insert(token, (key.to_string(), expires));
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        metadata: HashMap<String, String>,
    ) -> Result<(), StorageError> {
        self.objects.insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
                metadata,
            },
        );
        Ok(())
    }

    async fn head_object(&self, key: &str) -> Result<ObjectMetadata, StorageError> {
        self.objects
            .get(key)
            .map(|object| ObjectMetadata {
                content_type: Some(object.content_type.clone()),
                content_length: object.bytes.len() as u64,
                metadata: object.metadata.clone(),
            })
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
        let token = format!("{:016x}", self.sequence.fetch_add(1, Ordering::Relaxed));

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::Configuration("Base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .push("media")
            .extend(key.split('/'));
        url.query_pairs_mut()
            .append_pair("expires", &expires.to_string())
            .append_pair("token", &token);
        self.remember(token, key, expires);

        Ok(url.to_string())
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        self.objects.remove(key);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
