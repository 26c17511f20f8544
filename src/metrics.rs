//! Prometheus metrics for upstream calls, the response cache and snapshot runs.
//!
//! This module provides metrics for:
//! - Upstream request latency per endpoint
//! - Cache hits and misses
//! - Upstream failures
//! - Snapshot runs and warnings per pipeline

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::debug;

// === Metric Name Constants ===

/// Upstream request latency metric name.
pub const METRIC_UPSTREAM_LATENCY: &str = "odds_api_request_latency_ms";
/// Snapshot run duration metric name.
pub const METRIC_SNAPSHOT_DURATION: &str = "snapshot_run_duration_ms";
/// Cache hits counter metric name.
pub const METRIC_CACHE_HITS: &str = "odds_api_cache_hits_total";
/// Cache misses counter metric name.
pub const METRIC_CACHE_MISSES: &str = "odds_api_cache_misses_total";
/// Upstream errors counter metric name.
pub const METRIC_UPSTREAM_ERRORS: &str = "odds_api_errors_total";
/// Snapshot runs counter metric name.
pub const METRIC_SNAPSHOT_RUNS: &str = "snapshot_runs_total";
/// Snapshot warnings counter metric name.
pub const METRIC_SNAPSHOT_WARNINGS: &str = "snapshot_warnings_total";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_histogram!(
        METRIC_UPSTREAM_LATENCY,
        "Odds API request latency in milliseconds"
    );
    describe_histogram!(
        METRIC_SNAPSHOT_DURATION,
        "Snapshot pipeline run duration in milliseconds"
    );

    describe_counter!(METRIC_CACHE_HITS, "Responses served from the cache");
    describe_counter!(METRIC_CACHE_MISSES, "Cache lookups that went upstream");
    describe_counter!(
        METRIC_UPSTREAM_ERRORS,
        "Odds API requests that failed or returned a non-success status"
    );
    describe_counter!(METRIC_SNAPSHOT_RUNS, "Completed snapshot runs by kind");
    describe_counter!(
        METRIC_SNAPSHOT_WARNINGS,
        "Per-scope warnings recorded by snapshot runs"
    );

    debug!("Metrics initialized");
}

/// Install the Prometheus recorder and return the render handle.
pub fn install_prometheus() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    init_metrics();
    Ok(handle)
}

/// Record upstream request latency.
pub fn record_upstream_latency(start: Instant, endpoint: &str) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_UPSTREAM_LATENCY, "endpoint" => endpoint_label(endpoint)).record(latency_ms);
}

/// Collapse a request path into a low-cardinality endpoint label.
///
/// `/sports/basketball_nba/events/abc/odds` becomes `odds`.
pub fn endpoint_label(path: &str) -> &'static str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.ends_with("/odds") {
        "odds"
    } else if trimmed.ends_with("/markets") {
        "markets"
    } else if trimmed.ends_with("/events") {
        "events"
    } else if trimmed.ends_with("/sports") {
        "sports"
    } else {
        "other"
    }
}

/// Increment cache hits counter.
pub fn inc_cache_hits() {
    counter!(METRIC_CACHE_HITS).increment(1);
}

/// Increment cache misses counter.
pub fn inc_cache_misses() {
    counter!(METRIC_CACHE_MISSES).increment(1);
}

/// Increment upstream errors counter.
pub fn inc_upstream_errors() {
    counter!(METRIC_UPSTREAM_ERRORS).increment(1);
}

/// Record a finished snapshot run and its warnings.
pub fn record_snapshot_run(kind: &str, warnings: usize) {
    counter!(METRIC_SNAPSHOT_RUNS, "kind" => kind.to_string()).increment(1);
    if warnings > 0 {
        counter!(METRIC_SNAPSHOT_WARNINGS, "kind" => kind.to_string()).increment(warnings as u64);
    }
}

/// RAII guard for timing operations.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
    kind: &'static str,
}

impl LatencyTimer {
    /// Create a new latency timer for the given metric, labelled by kind.
    pub fn new(metric_name: &'static str, kind: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
            kind,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        let latency_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        histogram!(self.metric_name, "kind" => self.kind).record(latency_ms);
    }
}

/// Create a latency timer for one snapshot run.
pub fn timer_snapshot(kind: &'static str) -> LatencyTimer {
    LatencyTimer::new(METRIC_SNAPSHOT_DURATION, kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn latency_timer_measures_time() {
        let timer = timer_snapshot("market");
        sleep(Duration::from_millis(10));
        assert!(timer.elapsed_ms() >= 9.0);
    }

    #[test]
    fn endpoint_labels_are_low_cardinality() {
        assert_eq!(endpoint_label("/sports"), "sports");
        assert_eq!(endpoint_label("/sports/basketball_nba/events"), "events");
        assert_eq!(endpoint_label("/sports/basketball_nba/events/E1/markets"), "markets");
        assert_eq!(endpoint_label("/sports/basketball_nba/events/E1/odds"), "odds");
        assert_eq!(endpoint_label("/unknown"), "other");
    }
}
