use crate::metrics;
use axum::{
    http::header,
    response::{IntoResponse, Response},
};

/// Prometheus scrape endpoint
pub async fn serve_metrics() -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::handle().render(),
    )
        .into_response()
}
