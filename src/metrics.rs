//! Prometheus metrics for the delivery path.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global recorder once and return its render handle.
pub fn handle() -> &'static PrometheusHandle {
    HANDLE.get_or_init(|| {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        // Another recorder may already be installed (tests, embedding apps);
        // the handle then renders nothing, which is acceptable.
        let _ = metrics::set_global_recorder(recorder);
        handle
    })
}

pub fn record_request(endpoint: &'static str, status: u16) {
    counter!("lectern_requests_total", "endpoint" => endpoint, "status" => status.to_string())
        .increment(1);
}

pub fn record_duration(endpoint: &'static str, start: Instant) {
    histogram!("lectern_request_duration_seconds", "endpoint" => endpoint)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_cache_lookup(cache: &'static str, hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("lectern_cache_lookups_total", "cache" => cache, "result" => result).increment(1);
}

pub fn record_rate_limited() {
    counter!("lectern_rate_limited_total").increment(1);
}

pub fn record_auto_enrollment() {
    counter!("lectern_auto_enrollments_total").increment(1);
}

pub fn record_storage_error() {
    counter!("lectern_storage_errors_total").increment(1);
}
