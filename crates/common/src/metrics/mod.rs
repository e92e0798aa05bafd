//! Metrics and observability utilities
//!
//! Prometheus-style metrics through the `metrics` facade with
//! standardized naming. Recording is a no-op until a recorder is installed.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

/// Metrics prefix for all CiteIndex metrics
pub const METRICS_PREFIX: &str = "citeindex";

/// Buckets for similarity call latency (in seconds)
pub const SIMILARITY_BUCKETS: &[f64] = &[
    0.010,  // 10ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.000,  // 2s
    5.000,  // 5s - default per-call timeout
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_entities_total", METRICS_PREFIX),
        Unit::Count,
        "Focal entities processed, by phase and outcome"
    );

    describe_counter!(
        format!("{}_index_values_total", METRICS_PREFIX),
        Unit::Count,
        "Index fields evaluated, by index and outcome"
    );

    describe_counter!(
        format!("{}_similarity_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Similarity service requests, by status"
    );

    describe_histogram!(
        format!("{}_similarity_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Similarity request latency in seconds"
    );

    describe_histogram!(
        format!("{}_page_commit_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Page commit latency in seconds"
    );

    describe_counter!(
        format!("{}_graph_cache_total", METRICS_PREFIX),
        Unit::Count,
        "Graph cache lookups, by result"
    );

    tracing::info!("Metrics registered");
}

/// Record the outcome of one focal entity (`resolved`, `skipped`, `failed`)
pub fn record_entity(phase: &str, outcome: &str) {
    counter!(
        format!("{}_entities_total", METRICS_PREFIX),
        "phase" => phase.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record the outcome of one index field (`computed`, `undefined`, `failed`)
pub fn record_index_value(index: &str, outcome: &str) {
    counter!(
        format!("{}_index_values_total", METRICS_PREFIX),
        "index" => index.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Helper to record similarity request metrics
pub fn record_similarity(duration_secs: f64, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_similarity_requests_total", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .increment(1);

    if success {
        histogram!(format!("{}_similarity_duration_seconds", METRICS_PREFIX))
            .record(duration_secs);
    }
}

/// Helper to record a page commit
pub fn record_commit(phase: &str, duration_secs: f64) {
    histogram!(
        format!("{}_page_commit_duration_seconds", METRICS_PREFIX),
        "phase" => phase.to_string()
    )
    .record(duration_secs);
}

/// Helper to record graph cache metrics
pub fn record_cache(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!(
        format!("{}_graph_cache_total", METRICS_PREFIX),
        "result" => result.to_string()
    )
    .increment(1);
}
