use crate::{
    cache::{CacheStore, MemoryCacheStore},
    config::{CacheStoreType, Config, StorageBackendType},
    delivery::{DeliveryService, DeliverySettings},
    storage::{MemoryStorage, ObjectStorage},
    store::{DocumentStore, MemoryStore},
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Signed-URL delivery path
    pub delivery: DeliveryService,
    /// Cache backend, kept for the background sweep
    pub cache: Arc<dyn CacheStore>,
    pub cache_backend: &'static str,
    pub storage_backend: &'static str,
    /// Server start time, used for uptime reporting
    pub started_at: Instant,
    /// In-process media served under `/media` when storage is the memory backend
    pub media: Option<MemoryStorage>,
}

impl AppState {
    /// Wire state from explicit backends.
    pub fn with_backends(
        config: Config,
        store: Arc<dyn DocumentStore>,
        storage: Arc<dyn ObjectStorage>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        let cache_backend = cache.backend_name();
        let storage_backend = storage.backend_name();
        let delivery =
            DeliveryService::new(store, storage, cache.clone(), DeliverySettings::from(&config));

        Self {
            config: Arc::new(config),
            delivery,
            cache,
            cache_backend,
            storage_backend,
            started_at: Instant::now(),
            media: None,
        }
    }

    /// Serve `storage`'s presigned URLs from this server's `/media` route.
    pub fn with_media(mut self, storage: MemoryStorage) -> Self {
        self.media = Some(storage);
        self
    }

    /// Build backends from configuration and wire state.
    pub async fn from_config(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        let store = match &config.catalog_path {
            Some(path) => MemoryStore::load(path)?,
            None => {
                warn!("CATALOG_PATH not set, starting with an empty catalog");
                MemoryStore::new()
            }
        };
        let (storage, media) = build_storage(&config).await?;
        let cache = build_cache(&config).await?;

        info!(
            "Backends: cache={}, storage={}",
            cache.backend_name(),
            storage.backend_name()
        );

        let state = Self::with_backends(config, Arc::new(store), storage, cache);
        Ok(match media {
            Some(media) => state.with_media(media),
            None => state,
        })
    }
}

async fn build_cache(config: &Config) -> Result<Arc<dyn CacheStore>, Box<dyn std::error::Error>> {
    match config.cache_store {
        CacheStoreType::Memory => Ok(Arc::new(MemoryCacheStore::new())),
        #[cfg(feature = "valkey")]
        CacheStoreType::Valkey => {
            let url = config
                .valkey_url
                .as_deref()
                .ok_or("VALKEY_URL is required when CACHE_STORE=valkey")?;
            Ok(Arc::new(crate::cache::ValkeyCacheStore::connect(url).await?))
        }
        #[cfg(not(feature = "valkey"))]
        CacheStoreType::Valkey => {
            Err("CACHE_STORE=valkey requires building with the `valkey` feature".into())
        }
    }
}

/// Storage backend, plus the memory store itself when it must be served locally.
type BuiltStorage = (Arc<dyn ObjectStorage>, Option<MemoryStorage>);

async fn build_storage(config: &Config) -> Result<BuiltStorage, Box<dyn std::error::Error>> {
    match config.storage_backend {
        StorageBackendType::Memory => {
            let storage = MemoryStorage::new(&config.public_base_url)?;
            Ok((Arc::new(storage.clone()), Some(storage)))
        }
        #[cfg(feature = "s3")]
        StorageBackendType::S3 => {
            let bucket = config
                .s3_bucket
                .clone()
                .ok_or("S3_BUCKET is required when STORAGE_BACKEND=s3")?;
            let settings = crate::storage::S3Settings {
                bucket,
                region: config.s3_region.clone(),
                endpoint_url: config.s3_endpoint_url.clone(),
            };
            Ok((
                Arc::new(crate::storage::S3Storage::connect(&settings).await),
                None,
            ))
        }
        #[cfg(not(feature = "s3"))]
        StorageBackendType::S3 => {
            Err("STORAGE_BACKEND=s3 requires building with the `s3` feature".into())
        }
    }
}
