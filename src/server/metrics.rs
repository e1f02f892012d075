use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all ibeshi metrics
const PREFIX: &str = "ibeshi";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Error Metrics
    pub static ref ERRORS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_errors_total"), "Total errors by type and status"),
        &["error_type", "status"]
    ).expect("Failed to create errors_total metric");

    // Matchmaking Metrics
    pub static ref CANDIDATES_SURFACED_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_candidates_surfaced_total"),
        "Total candidates surfaced to users"
    ).expect("Failed to create candidates_surfaced_total metric");

    pub static ref MATCH_ACTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_match_actions_total"), "Swipe actions recorded"),
        &["action"]
    ).expect("Failed to create match_actions_total metric");

    pub static ref MATCHES_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_matches_total"),
        "Total mutual matches"
    ).expect("Failed to create matches_total metric");

    // Profile Metrics
    pub static ref PROFILE_SYNCS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_profile_syncs_total"), "Listening profile syncs"),
        &["source", "status"]
    ).expect("Failed to create profile_syncs_total metric");

    // Conversation Metrics
    pub static ref MESSAGES_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_messages_total"),
        "Total messages posted"
    ).expect("Failed to create messages_total metric");

    pub static ref LIVE_CONNECTIONS: Gauge = Gauge::new(
        format!("{PREFIX}_live_connections"),
        "Open live message connections"
    ).expect("Failed to create live_connections metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(ERRORS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(CANDIDATES_SURFACED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(MATCH_ACTIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(MATCHES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PROFILE_SYNCS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(MESSAGES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(LIVE_CONNECTIONS.clone()));

    tracing::info!("Metrics system initialized successfully");
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

pub fn record_error(error_type: &str, status: u16) {
    ERRORS_TOTAL
        .with_label_values(&[error_type, &status.to_string()])
        .inc();
}

pub fn record_candidate_surfaced() {
    CANDIDATES_SURFACED_TOTAL.inc();
}

/// Record a swipe, and the match it produced if any
pub fn record_match_action(action: &str, matched: bool) {
    MATCH_ACTIONS_TOTAL.with_label_values(&[action]).inc();
    if matched {
        MATCHES_TOTAL.inc();
    }
}

pub fn record_profile_sync(source: &str, status: &str) {
    PROFILE_SYNCS_TOTAL.with_label_values(&[source, status]).inc();
}

pub fn record_message() {
    MESSAGES_TOTAL.inc();
}

pub fn live_connection_opened() {
    LIVE_CONNECTIONS.inc();
}

pub fn live_connection_closed() {
    LIVE_CONNECTIONS.dec();
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
