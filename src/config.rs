use std::env;
use std::str::FromStr;

/// Cache backend for access decisions, signed URLs and rate windows
#[derive(Clone, Debug, PartialEq)]
pub enum CacheStoreType {
    Memory,
    Valkey,
}

/// Object storage backend for lecture videos
#[derive(Clone, Debug, PartialEq)]
pub enum StorageBackendType {
    /// In-process objects with locally minted URLs (dev and tests)
    Memory,
    /// S3-compatible bucket (AWS S3, Cloudflare R2, MinIO)
    S3,
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    /// Public base URL; the memory storage backend mints URLs under it
    pub public_base_url: String,
    pub is_dev: bool,
    /// Cache backend
    pub cache_store: CacheStoreType,
    /// Valkey/Redis URL (used when cache_store = Valkey)
    pub valkey_url: Option<String>,
    /// Object storage backend
    pub storage_backend: StorageBackendType,
    /// Bucket name (used when storage_backend = S3)
    pub s3_bucket: Option<String>,
    /// Signing region; "auto" for R2
    pub s3_region: String,
    /// Custom endpoint for S3-compatible providers
    pub s3_endpoint_url: Option<String>,
    /// JSON catalog seeding the in-memory document store
    pub catalog_path: Option<String>,
    /// Lifetime of issued playback URLs (default: 120)
    pub signed_url_ttl_secs: u64,
    /// Lifetime of cached access decisions, clamped to 1..=3600 (default: 180)
    pub access_cache_ttl_secs: u64,
    /// Signed-URL requests per viewer and client per window; 0 disables (default: 10)
    pub rate_limit_max_requests: u32,
    /// Rate limit window length (default: 60)
    pub rate_limit_window_secs: u64,
    /// Timeout for document store and object storage round-trips (default: 8)
    pub upstream_timeout_secs: u64,
    /// Period of the expired-entry sweep (default: 30)
    pub cache_sweep_interval_secs: u64,
    /// Upper bound on lectures per batch request (default: 50)
    pub max_batch_lectures: usize,
    /// Shared secret for the internal invalidation route; unset disables it
    pub internal_api_token: Option<String>,
}

/// Parse an env var, falling back to `default` when unset or invalid.
fn parse_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Like [`parse_or`], but zero also means "use the default".
fn positive_or(name: &str, default: u64) -> u64 {
    match parse_or(name, default) {
        0 => default,
        v => v,
    }
}

impl Config {
    /// Load configuration from environment variables
    /// In DEV mode, provides sensible defaults. In PROD mode, PORT and
    /// PUBLIC_BASE_URL are required.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        // Check if running in dev mode
        let is_dev = env::var("DEV_MODE")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        // Port: required in prod, defaults to 3000 in dev
        let port = if is_dev {
            env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?
        } else {
            env::var("PORT")
                .map_err(|_| "PORT is required in production")?
                .parse()?
        };

        // Public base URL: required in prod, defaults to localhost in dev
        let public_base_url = if is_dev {
            env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
        } else {
            env::var("PUBLIC_BASE_URL")
                .map_err(|_| "PUBLIC_BASE_URL is required in production")?
        };

        let cache_store = match env::var("CACHE_STORE")
            .unwrap_or_else(|_| "memory".to_string())
            .to_lowercase()
            .as_str()
        {
            "valkey" | "redis" => CacheStoreType::Valkey,
            _ => CacheStoreType::Memory,
        };
        let valkey_url = env::var("VALKEY_URL").ok();

        let storage_backend = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "memory".to_string())
            .to_lowercase()
            .as_str()
        {
            "s3" | "r2" => StorageBackendType::S3,
            _ => StorageBackendType::Memory,
        };
        let s3_bucket = env::var("S3_BUCKET").ok();
        let s3_region = env::var("S3_REGION").unwrap_or_else(|_| "auto".to_string());
        let s3_endpoint_url = env::var("S3_ENDPOINT_URL").ok();

        let catalog_path = env::var("CATALOG_PATH").ok();

        // A zero TTL would let the URL cache hand out expired URLs
        let signed_url_ttl_secs = parse_or("SIGNED_URL_TTL_SECS", 120);
        if signed_url_ttl_secs == 0 {
            return Err("SIGNED_URL_TTL_SECS must be greater than 0".into());
        }

        let access_cache_ttl_secs = parse_or("ACCESS_CACHE_TTL_SECS", 180u64).clamp(1, 3600);
        let rate_limit_max_requests = parse_or("RATE_LIMIT_MAX_REQUESTS", 10);
        let rate_limit_window_secs = positive_or("RATE_LIMIT_WINDOW_SECS", 60);
        let upstream_timeout_secs = positive_or("UPSTREAM_TIMEOUT_SECS", 8);
        let cache_sweep_interval_secs = positive_or("CACHE_SWEEP_INTERVAL_SECS", 30);
        let max_batch_lectures = match parse_or("MAX_BATCH_LECTURES", 50usize) {
            0 => 50,
            v => v,
        };

        let internal_api_token = env::var("INTERNAL_API_TOKEN")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        Ok(Config {
            port,
            public_base_url,
            is_dev,
            cache_store,
            valkey_url,
            storage_backend,
            s3_bucket,
            s3_region,
            s3_endpoint_url,
            catalog_path,
            signed_url_ttl_secs,
            access_cache_ttl_secs,
            rate_limit_max_requests,
            rate_limit_window_secs,
            upstream_timeout_secs,
            cache_sweep_interval_secs,
            max_batch_lectures,
            internal_api_token,
        })
    }

    /// Dev-mode defaults without reading the environment.
    pub fn dev() -> Self {
        Config {
            port: 3000,
            public_base_url: "http://localhost:3000".to_string(),
            is_dev: true,
            cache_store: CacheStoreType::Memory,
            valkey_url: None,
            storage_backend: StorageBackendType::Memory,
            s3_bucket: None,
            s3_region: "auto".to_string(),
            s3_endpoint_url: None,
            catalog_path: None,
            signed_url_ttl_secs: 120,
            access_cache_ttl_secs: 180,
            rate_limit_max_requests: 10,
            rate_limit_window_secs: 60,
            upstream_timeout_secs: 8,
            cache_sweep_interval_secs: 30,
            max_batch_lectures: 50,
            internal_api_token: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serialize all env-var tests to prevent races between parallel test threads.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Every variable `from_env` reads.
    const ALL_VARS: &[&str] = &[
        "DEV_MODE",
        "PORT",
        "PUBLIC_BASE_URL",
        "CACHE_STORE",
        "VALKEY_URL",
        "STORAGE_BACKEND",
        "S3_BUCKET",
        "S3_REGION",
        "S3_ENDPOINT_URL",
        "CATALOG_PATH",
        "SIGNED_URL_TTL_SECS",
        "ACCESS_CACHE_TTL_SECS",
        "RATE_LIMIT_MAX_REQUESTS",
        "RATE_LIMIT_WINDOW_SECS",
        "UPSTREAM_TIMEOUT_SECS",
        "CACHE_SWEEP_INTERVAL_SECS",
        "MAX_BATCH_LECTURES",
        "INTERNAL_API_TOKEN",
    ];

    /// Clear every config var, set `set`, run `f`, then restore original state.
    fn with_env(set: &[(&str, &str)], f: impl FnOnce()) {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());

        let saved: Vec<(&str, Option<String>)> =
            ALL_VARS.iter().map(|k| (*k, std::env::var(k).ok())).collect();

        for k in ALL_VARS {
            // SAFETY: serialized by ENV_LOCK; no other thread modifies env vars concurrently.
            unsafe { std::env::remove_var(k) };
        }
        for (k, v) in set {
            unsafe { std::env::set_var(k, v) };
        }

        f();

        // Restore
        for (k, old) in saved {
            match old {
                Some(v) => unsafe { std::env::set_var(k, v) },
                None => unsafe { std::env::remove_var(k) },
            }
        }
    }

    #[test]
    fn dev_mode_uses_defaults() {
        with_env(&[("DEV_MODE", "true")], || {
            let config = Config::from_env().expect("should succeed in dev mode");
            assert!(config.is_dev);
            assert_eq!(config.port, 3000);
            assert_eq!(config.public_base_url, "http://localhost:3000");
            assert_eq!(config.cache_store, CacheStoreType::Memory);
            assert_eq!(config.storage_backend, StorageBackendType::Memory);
            assert_eq!(config.s3_region, "auto");
            assert_eq!(config.signed_url_ttl_secs, 120);
            assert_eq!(config.access_cache_ttl_secs, 180);
            assert_eq!(config.rate_limit_max_requests, 10);
            assert_eq!(config.rate_limit_window_secs, 60);
            assert_eq!(config.upstream_timeout_secs, 8);
            assert_eq!(config.max_batch_lectures, 50);
        });
    }

    #[test]
    fn prod_mode_requires_port() {
        with_env(&[], || {
            let result = Config::from_env();
            assert!(result.is_err(), "Should fail without PORT in prod mode");
        });
    }

    #[test]
    fn prod_mode_requires_public_base_url() {
        with_env(&[("PORT", "8080")], || {
            let result = Config::from_env();
            assert!(
                result.is_err(),
                "Should fail without PUBLIC_BASE_URL in prod mode"
            );
        });
    }

    #[test]
    fn prod_mode_with_required_vars() {
        with_env(
            &[("PORT", "8080"), ("PUBLIC_BASE_URL", "https://learn.example.com")],
            || {
                let config = Config::from_env().unwrap();
                assert!(!config.is_dev);
                assert_eq!(config.port, 8080);
                assert_eq!(config.internal_api_token, None);
            },
        );
    }

    #[test]
    fn cache_store_redis_alias() {
        with_env(&[("DEV_MODE", "true"), ("CACHE_STORE", "redis")], || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.cache_store, CacheStoreType::Valkey);
        });
    }

    #[test]
    fn storage_backend_s3() {
        with_env(
            &[
                ("DEV_MODE", "true"),
                ("STORAGE_BACKEND", "s3"),
                ("S3_BUCKET", "lectures"),
                ("S3_ENDPOINT_URL", "https://acct.r2.cloudflarestorage.com"),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.storage_backend, StorageBackendType::S3);
                assert_eq!(config.s3_bucket.as_deref(), Some("lectures"));
                assert!(config.s3_endpoint_url.is_some());
            },
        );
    }

    #[test]
    fn zero_signed_url_ttl_is_rejected() {
        with_env(&[("DEV_MODE", "true"), ("SIGNED_URL_TTL_SECS", "0")], || {
            assert!(Config::from_env().is_err());
        });
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        with_env(
            &[
                ("DEV_MODE", "true"),
                ("SIGNED_URL_TTL_SECS", "soon"),
                ("RATE_LIMIT_WINDOW_SECS", "0"),
                ("MAX_BATCH_LECTURES", "-3"),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.signed_url_ttl_secs, 120);
                assert_eq!(config.rate_limit_window_secs, 60);
                assert_eq!(config.max_batch_lectures, 50);
            },
        );
    }

    #[test]
    fn access_ttl_is_clamped() {
        with_env(
            &[("DEV_MODE", "true"), ("ACCESS_CACHE_TTL_SECS", "86400")],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.access_cache_ttl_secs, 3600);
            },
        );
    }

    #[test]
    fn zero_rate_limit_disables_limiting() {
        with_env(
            &[("DEV_MODE", "true"), ("RATE_LIMIT_MAX_REQUESTS", "0")],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.rate_limit_max_requests, 0);
            },
        );
    }

    #[test]
    fn blank_internal_token_is_unset() {
        with_env(&[("DEV_MODE", "true"), ("INTERNAL_API_TOKEN", "  ")], || {
            assert_eq!(Config::from_env().unwrap().internal_api_token, None);
        });
        with_env(&[("DEV_MODE", "true"), ("INTERNAL_API_TOKEN", "s3cret")], || {
            assert_eq!(
                Config::from_env().unwrap().internal_api_token.as_deref(),
                Some("s3cret")
            );
        });
    }
}
