//! Request extractors for the viewer identity, the client address and
//! internal callers.
//!
//! Authentication happens upstream: the gateway validates the session and
//! forwards the viewer id in `X-Viewer-Id`. An absent or blank header means
//! an anonymous request; the delivery path turns that into 401 itself, so
//! extraction never fails.

use crate::server::state::AppState;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{HeaderMap, StatusCode, request::Parts};
use std::convert::Infallible;
use std::net::SocketAddr;
use tracing::warn;

pub const VIEWER_HEADER: &str = "x-viewer-id";
pub const INTERNAL_TOKEN_HEADER: &str = "x-internal-token";

/// Viewer id forwarded by the auth gateway, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer(pub Option<String>);

impl Viewer {
    pub fn id(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Viewer {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let viewer = parts
            .headers
            .get(VIEWER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        Ok(Viewer(viewer))
    }
}

/// Marker for requests carrying the configured internal API token.
///
/// Rejects with 401 when the header is missing or wrong, and with 403 when
/// no token is configured, which keeps internal routes closed by default.
#[derive(Debug, Clone, Copy)]
pub struct InternalCaller;

impl FromRequestParts<AppState> for InternalCaller {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.internal_api_token.as_deref() else {
            warn!("Internal route called but INTERNAL_API_TOKEN is not set");
            return Err(StatusCode::FORBIDDEN);
        };
        let presented = parts
            .headers
            .get(INTERNAL_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if tokens_match(presented.as_bytes(), expected.as_bytes()) {
            Ok(InternalCaller)
        } else {
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// Length-then-bytes comparison that does not stop at the first mismatch.
fn tokens_match(presented: &[u8], expected: &[u8]) -> bool {
    presented.len() == expected.len()
        && presented
            .iter()
            .zip(expected)
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}

/// Client address used as the second half of the rate-limit key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddr(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientAddr {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ip) = forwarded_ip(&parts.headers) {
            return Ok(ClientAddr(ip));
        }
        if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            return Ok(ClientAddr(addr.ip().to_string()));
        }
        // Neither proxied nor served with connect info (router tests)
        Ok(ClientAddr("unknown".to_string()))
    }
}

/// Client IP from X-Forwarded-For (first hop) or X-Real-IP.
fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for")
        && let Ok(value) = forwarded.to_str()
        && let Some(first_ip) = value.split(',').next()
    {
        let ip = first_ip.trim();
        if !ip.is_empty() {
            return Some(ip.to_string());
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract<T: FromRequestParts<(), Rejection = Infallible>>(
        request: Request<()>,
    ) -> T {
        let (mut parts, _) = request.into_parts();
        match T::from_request_parts(&mut parts, &()).await {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    #[tokio::test]
    async fn viewer_from_header() {
        let req = Request::builder()
            .header(VIEWER_HEADER, " viewer-42 ")
            .body(())
            .unwrap();
        let viewer: Viewer = extract(req).await;
        assert_eq!(viewer.id(), Some("viewer-42"));
    }

    #[tokio::test]
    async fn blank_viewer_is_anonymous() {
        let req = Request::builder().header(VIEWER_HEADER, "  ").body(()).unwrap();
        let viewer: Viewer = extract(req).await;
        assert_eq!(viewer.id(), None);

        let viewer: Viewer = extract(Request::builder().body(()).unwrap()).await;
        assert_eq!(viewer.id(), None);
    }

    #[tokio::test]
    async fn client_from_first_forwarded_hop() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(())
            .unwrap();
        let client: ClientAddr = extract(req).await;
        assert_eq!(client.0, "203.0.113.7");
    }

    #[tokio::test]
    async fn client_from_real_ip_then_connect_info() {
        let req = Request::builder()
            .header("x-real-ip", "198.51.100.2")
            .body(())
            .unwrap();
        let client: ClientAddr = extract(req).await;
        assert_eq!(client.0, "198.51.100.2");

        let mut req = Request::builder().body(()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));
        let client: ClientAddr = extract(req).await;
        assert_eq!(client.0, "127.0.0.1");
    }

    #[test]
    fn token_comparison() {
        assert!(tokens_match(b"s3cret", b"s3cret"));
        assert!(!tokens_match(b"s3cres", b"s3cret"));
        assert!(!tokens_match(b"s3cret-longer", b"s3cret"));
        assert!(!tokens_match(b"", b"s3cret"));
    }

    #[tokio::test]
    async fn client_falls_back_to_unknown() {
        let client: ClientAddr = extract(Request::builder().body(()).unwrap()).await;
        assert_eq!(client.0, "unknown");
    }
}
