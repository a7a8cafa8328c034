//! Prometheus metrics for the API server.

use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "relay_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "relay_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "relay_http_requests_in_flight";

    // Job lifecycle metrics
    pub const SUBMISSIONS_TOTAL: &str = "relay_submissions_total";
    pub const ORPHANED_SUBMISSIONS_TOTAL: &str = "relay_orphaned_submissions_total";
    pub const WEBHOOK_DELIVERIES_TOTAL: &str = "relay_webhook_deliveries_total";
    pub const POLL_FALLBACKS_TOTAL: &str = "relay_poll_fallbacks_total";
    pub const FINALIZATIONS_TOTAL: &str = "relay_finalizations_total";
    pub const FINALIZATION_DURATION_SECONDS: &str = "relay_finalization_duration_seconds";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "relay_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path).to_string()),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a submission outcome (`accepted`, `invalid`, `upstream_failed`, `store_failed`).
pub fn record_submission(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::SUBMISSIONS_TOTAL, &labels).increment(1);
}

/// Record a provider job the store never learned about.
pub fn record_orphaned_submission() {
    counter!(names::ORPHANED_SUBMISSIONS_TOTAL).increment(1);
}

/// Record a webhook delivery.
pub fn record_webhook_delivery(disposition: &str) {
    let labels = [("disposition", disposition.to_string())];
    counter!(names::WEBHOOK_DELIVERIES_TOTAL, &labels).increment(1);
}

/// Record a poll that had to ask the provider.
pub fn record_poll_fallback(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::POLL_FALLBACKS_TOTAL, &labels).increment(1);
}

/// Record a finalization attempt.
pub fn record_finalization(channel: &str, outcome: &str, duration_secs: f64) {
    let labels = [
        ("channel", channel.to_string()),
        ("outcome", outcome.to_string()),
    ];
    counter!(names::FINALIZATIONS_TOTAL, &labels).increment(1);
    histogram!(names::FINALIZATION_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint).to_string())];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Collapse request paths onto the known routes to bound label cardinality.
fn sanitize_path(path: &str) -> &'static str {
    match path.trim_end_matches('/') {
        "/api/jobs" => "/api/jobs",
        "/api/jobs/status" => "/api/jobs/status",
        "/api/webhooks/provider" => "/api/webhooks/provider",
        "/health" => "/health",
        "/healthz" => "/healthz",
        "/ready" => "/ready",
        "/metrics" => "/metrics",
        _ => "other",
    }
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
