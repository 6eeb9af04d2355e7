//! Signed URL issuance over the object-storage capability.

use crate::metrics;
use crate::storage::{ObjectStorage, StorageError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default playback URL lifetime. Short enough that a leaked URL is worth
/// little, long enough to cover player buffering and retries.
pub const DEFAULT_SIGNED_URL_TTL: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SignedUrlIssuer {
    storage: Arc<dyn ObjectStorage>,
    ttl: Duration,
    timeout: Duration,
}

impl SignedUrlIssuer {
    pub fn new(storage: Arc<dyn ObjectStorage>, ttl: Duration, timeout: Duration) -> Self {
        Self {
            storage,
            ttl,
            timeout,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a playback URL with the configured TTL.
    pub async fn issue(&self, storage_key: &str) -> Result<IssuedUrl, StorageError> {
        self.issue_with_ttl(storage_key, self.ttl).await
    }

    /// Verify the object exists, then presign it for `ttl`.
    ///
    /// `expires_at` is taken before the provider signs, so it never exceeds
    /// the real expiry of the returned URL.
    pub async fn issue_with_ttl(
        &self,
        storage_key: &str,
        ttl: Duration,
    ) -> Result<IssuedUrl, StorageError> {
        let issued_at = Utc::now();
        let expires_at = issued_at
            + chrono::Duration::from_std(ttl)
                .map_err(|e| StorageError::Configuration(format!("Invalid URL TTL: {e}")))?;

        let result = tokio::time::timeout(self.timeout, async {
            self.storage.head_object(storage_key).await?;
            self.storage.presign_get(storage_key, ttl).await
        })
        .await
        .unwrap_or(Err(StorageError::Timeout(self.timeout)));

        match result {
            Ok(url) => {
                debug!("Issued signed URL for {} (ttl {}s)", storage_key, ttl.as_secs());
                Ok(IssuedUrl { url, expires_at })
            }
            Err(e) => {
                warn!("Signed URL issuance failed for {}: {}", storage_key, e);
                metrics::record_storage_error();
                Err(e)
            }
        }
    }
}
