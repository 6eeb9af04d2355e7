//! Signed video delivery: entitlement checks, short-lived playback URLs,
//! and the caches and rate limiter that keep repeated polls cheap.

pub mod access_cache;
pub mod entitlement;
pub mod issuer;
pub mod rate_limit;
pub mod service;
pub mod url_cache;

pub use access_cache::AccessDecisionCache;
pub use entitlement::EntitlementResolver;
pub use issuer::{DEFAULT_SIGNED_URL_TTL, IssuedUrl, SignedUrlIssuer};
pub use rate_limit::RateLimiter;
pub use service::{BatchResults, DeliveryService, DeliverySettings};
pub use url_cache::SignedUrlCache;
