//! S3-compatible storage backend (AWS S3, Cloudflare R2, MinIO).

use super::{ObjectMetadata, ObjectStorage, StorageError};
use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, info};

/// Connection settings for an S3-compatible bucket.
#[derive(Clone)]
pub struct S3Settings {
    pub bucket: String,
    /// `auto` for R2.
    pub region: String,
    /// Endpoint override for R2 / MinIO / LocalStack.
    pub endpoint_url: Option<String>,
}

impl std::fmt::Debug for S3Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Settings")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .finish()
    }
}

pub struct S3Storage {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl std::fmt::Debug for S3Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Storage")
            .field("bucket", &self.bucket)
            .field("client", &"<S3Client>")
            .finish()
    }
}

impl S3Storage {
    /// Build a client from the standard AWS credential chain.
    pub async fn connect(settings: &S3Settings) -> Self {
        let mut loader =
            aws_config::from_env().region(aws_config::Region::new(settings.region.clone()));
        if let Some(endpoint) = &settings.endpoint_url {
            debug!(endpoint = %endpoint, "using custom S3 endpoint");
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if settings.endpoint_url.is_some() {
            builder = builder.force_path_style(true);
        }

        info!(bucket = %settings.bucket, "S3 storage configured");
        Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
            bucket: settings.bucket.clone(),
        }
    }

    /// Create an `S3Storage` with a pre-built client.
    pub fn with_client(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        metadata: HashMap<String, String>,
    ) -> Result<(), StorageError> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes));

        for (mk, mv) in &metadata {
            request = request.metadata(mk, mv);
        }

        request.send().await.map_err(|e| {
            let err_str = e.to_string();
            error!(error = %err_str, key = %key, "S3 put_object failed");
            StorageError::Provider(err_str)
        })?;

        debug!(key = %key, "S3 object uploaded");
        Ok(())
    }

    async fn head_object(&self, key: &str) -> Result<ObjectMetadata, StorageError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => Ok(ObjectMetadata {
                content_type: output.content_type().map(str::to_owned),
                content_length: output.content_length().unwrap_or(0).max(0) as u64,
                metadata: output.metadata().cloned().unwrap_or_default(),
            }),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Err(StorageError::NotFound(key.to_string()))
                } else {
                    Err(StorageError::Provider(service_error.to_string()))
                }
            }
        }
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        let config = PresigningConfig::expires_in(ttl)
            .map_err(|e| StorageError::Configuration(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|e| StorageError::Provider(e.to_string()))?;

        Ok(request.uri().to_string())
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let err_str = e.to_string();
                error!(error = %err_str, key = %key, "S3 delete_object failed");
                StorageError::Provider(err_str)
            })?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_debug_lists_bucket() {
        let settings = S3Settings {
            bucket: "lectures".to_string(),
            region: "auto".to_string(),
            endpoint_url: Some("https://account.r2.cloudflarestorage.com".to_string()),
        };
        let debug = format!("{settings:?}");
        assert!(debug.contains("lectures"));
        assert!(debug.contains("r2.cloudflarestorage.com"));
    }
}
