// Prometheus metrics definitions for the clanhall backend.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Counters ─────────────────────────────────────────────────────

    /// Total tournaments created.
    pub static ref TOURNAMENTS_CREATED_TOTAL: IntCounter = IntCounter::new(
        "clanhall_tournaments_created_total",
        "Tournaments created",
    )
    .unwrap();

    /// Total participant registrations, by source (self / direct).
    pub static ref REGISTRATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "clanhall_registrations_total",
            "Participant registrations",
        ),
        &["source"],
    )
    .unwrap();

    /// Total matches created.
    pub static ref MATCHES_CREATED_TOTAL: IntCounter = IntCounter::new(
        "clanhall_matches_created_total",
        "Matches created",
    )
    .unwrap();

    /// Total match results recorded.
    pub static ref RESULTS_RECORDED_TOTAL: IntCounter = IntCounter::new(
        "clanhall_results_recorded_total",
        "Match results recorded",
    )
    .unwrap();

    /// Total API requests, by method/endpoint/status.
    pub static ref API_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("clanhall_api_requests_total", "Total API requests"),
        &["method", "endpoint", "status"],
    )
    .unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    /// API request duration in seconds, by endpoint.
    pub static ref API_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "clanhall_api_request_duration_seconds",
            "API request duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0]),
        &["endpoint"],
    )
    .unwrap();

    /// Standings/bracket projection time in seconds, by view.
    pub static ref PROJECTION_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "clanhall_projection_duration_seconds",
            "Standings/bracket projection time in seconds",
        )
        .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
        &["view"],
    )
    .unwrap();
}

/// Register all metrics with the custom registry. Call once at startup.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(TOURNAMENTS_CREATED_TOTAL.clone()),
        Box::new(REGISTRATIONS_TOTAL.clone()),
        Box::new(MATCHES_CREATED_TOTAL.clone()),
        Box::new(RESULTS_RECORDED_TOTAL.clone()),
        Box::new(API_REQUESTS_TOTAL.clone()),
        Box::new(API_REQUEST_DURATION_SECONDS.clone()),
        Box::new(PROJECTION_DURATION_SECONDS.clone()),
    ];

    for c in collectors {
        REGISTRY.register(c).expect("failed to register metric");
    }
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Normalize a URL path for metric labels: replace numeric path segments
/// with `:id` to prevent cardinality explosion.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if segment.parse::<i64>().is_ok() {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
