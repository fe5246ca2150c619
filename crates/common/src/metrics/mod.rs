//! Metrics and observability utilities
//!
//! Counters and histograms for the exploration engine with standardized
//! `citegraph_*` naming.

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram,
    gauge, histogram, Unit,
};
use std::time::Instant;

/// Metrics prefix for all CiteGraph metrics
pub const METRICS_PREFIX: &str = "citegraph";

/// Buckets for upstream latency (remote scholarly APIs are slow)
pub const UPSTREAM_BUCKETS: &[f64] = &[
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.000,  // 2s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_expansions_total", METRICS_PREFIX),
        Unit::Count,
        "Expansions by relation kind and outcome"
    );

    describe_histogram!(
        format!("{}_expansion_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end expansion latency in seconds"
    );

    describe_counter!(
        format!("{}_upstream_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Upstream literature API requests"
    );

    describe_histogram!(
        format!("{}_upstream_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Upstream literature API latency in seconds"
    );

    describe_counter!(
        format!("{}_normalization_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Upstream records skipped because they lacked an identifier"
    );

    describe_counter!(
        format!("{}_inflight_duplicates_total", METRICS_PREFIX),
        Unit::Count,
        "Expansions suppressed because an identical one was in flight"
    );

    describe_counter!(
        format!("{}_crossref_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Link discovery queries issued by the cross-reference resolver"
    );

    describe_counter!(
        format!("{}_crossref_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Link discovery queries that failed"
    );

    describe_counter!(
        format!("{}_edges_deferred_total", METRICS_PREFIX),
        Unit::Count,
        "Edges parked until their missing endpoint arrives"
    );

    describe_counter!(
        format!("{}_edges_promoted_total", METRICS_PREFIX),
        Unit::Count,
        "Deferred edges inserted once both endpoints existed"
    );

    describe_counter!(
        format!("{}_pending_dropped_total", METRICS_PREFIX),
        Unit::Count,
        "Edges with an unknown endpoint dropped because the pending buffer was full"
    );

    describe_counter!(
        format!("{}_fallback_outcomes_total", METRICS_PREFIX),
        Unit::Count,
        "Fallback selector outcomes by relation kind used"
    );

    describe_gauge!(
        format!("{}_columns_open", METRICS_PREFIX),
        Unit::Count,
        "Currently open columns"
    );

    tracing::info!("Metrics registered");
}

/// Helper to time upstream requests
pub struct UpstreamTimer {
    start: Instant,
    endpoint: &'static str,
}

impl UpstreamTimer {
    /// Start tracking a request
    pub fn start(endpoint: &'static str) -> Self {
        Self {
            start: Instant::now(),
            endpoint,
        }
    }

    /// Record request completion
    pub fn finish(self, success: bool) {
        let status = if success { "success" } else { "error" };

        counter!(
            format!("{}_upstream_requests_total", METRICS_PREFIX),
            "endpoint" => self.endpoint,
            "status" => status
        )
        .increment(1);

        histogram!(
            format!("{}_upstream_duration_seconds", METRICS_PREFIX),
            "endpoint" => self.endpoint
        )
        .record(self.start.elapsed().as_secs_f64());
    }
}

/// Helper to record expansion metrics
pub fn record_expansion(duration_secs: f64, relation: &str, outcome: &str) {
    counter!(
        format!("{}_expansions_total", METRICS_PREFIX),
        "relation" => relation.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_expansion_duration_seconds", METRICS_PREFIX),
        "relation" => relation.to_string()
    )
    .record(duration_secs);
}

pub fn record_normalization_failures(count: usize) {
    if count > 0 {
        counter!(format!("{}_normalization_failures_total", METRICS_PREFIX)).increment(count as u64);
    }
}

pub fn record_inflight_duplicate(relation: &str) {
    counter!(
        format!("{}_inflight_duplicates_total", METRICS_PREFIX),
        "relation" => relation.to_string()
    )
    .increment(1);
}

/// Helper to record a cross-reference pass
pub fn record_crossref(queries: usize, failures: usize) {
    counter!(format!("{}_crossref_queries_total", METRICS_PREFIX)).increment(queries as u64);
    if failures > 0 {
        counter!(format!("{}_crossref_failures_total", METRICS_PREFIX)).increment(failures as u64);
    }
}

/// Helper to record pending-edge buffer movement
pub fn record_pending_edges(deferred: usize, promoted: usize, dropped: usize) {
    if deferred > 0 {
        counter!(format!("{}_edges_deferred_total", METRICS_PREFIX)).increment(deferred as u64);
    }
    if promoted > 0 {
        counter!(format!("{}_edges_promoted_total", METRICS_PREFIX)).increment(promoted as u64);
    }
    if dropped > 0 {
        counter!(format!("{}_pending_dropped_total", METRICS_PREFIX)).increment(dropped as u64);
    }
}

pub fn record_fallback(used: &str) {
    counter!(
        format!("{}_fallback_outcomes_total", METRICS_PREFIX),
        "used" => used.to_string()
    )
    .increment(1);
}

pub fn set_columns_open(count: usize) {
    gauge!(format!("{}_columns_open", METRICS_PREFIX)).set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_buckets_sorted() {
        let mut prev = 0.0;
        for &bucket in UPSTREAM_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
    }

    #[test]
    fn test_helpers_without_recorder() {
        // No recorder installed: calls must be no-ops
        let timer = UpstreamTimer::start("works");
        timer.finish(true);
        record_expansion(0.01, "citations", "success");
        record_pending_edges(1, 0, 0);
        set_columns_open(2);
    }
}
