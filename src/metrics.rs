// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the broker locator.
//!
//! All metrics carry the namespace prefix `broker_locator_` and are exposed on
//! the `/metrics` endpoint of the trigger service.
//!
//! # Metrics Categories
//!
//! - **Run Metrics** - Count reconciliation runs by status and time them
//! - **Record Metrics** - Count per-hostname apply outcomes
//! - **Join Metrics** - Count brokers left unresolved and records skipped
//! - **Error Metrics** - Count run-level failures by reason
//!
//! # Example
//!
//! ```rust,no_run
//! use broker_locator::metrics::{gather_metrics, record_run};
//!
//! record_run("success", std::time::Duration::from_secs(1));
//! let text = gather_metrics().unwrap();
//! assert!(text.contains("broker_locator_reconciliations_total"));
//! ```

use prometheus::{
    Counter, CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all locator metrics
const METRICS_NAMESPACE: &str = "broker_locator";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Run Metrics
// ============================================================================

/// Total number of reconciliation runs by status
///
/// Labels:
/// - `status`: Outcome (`success`, `conflict`, `failed`, `error`)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of reconciliation runs by status",
    );
    let counter = CounterVec::new(opts, &["status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconciliation runs in seconds
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconciliation runs in seconds",
    )
    .buckets(vec![0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]);
    let histogram = Histogram::with_opts(opts).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Total number of run-level failures by reason
///
/// Labels:
/// - `reason`: Stable reason code (e.g., `DiscoveryAuthFailed`, `ListingFailed`)
pub static ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_errors_total"),
        "Total number of failed reconciliation runs by reason",
    );
    let counter = CounterVec::new(opts, &["reason"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Record Metrics
// ============================================================================

/// Total number of per-hostname apply outcomes
///
/// Labels:
/// - `outcome`: `created`, `noop`, `conflict` or `failed`
pub static RECORD_OUTCOMES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_record_outcomes_total"),
        "Total number of record apply outcomes by outcome",
    );
    let counter = CounterVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Join Metrics
// ============================================================================

/// Total number of brokers that had no usable published record
pub static UNRESOLVED_BROKERS_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    let counter = Counter::new(
        format!("{METRICS_NAMESPACE}_unresolved_brokers_total"),
        "Total number of brokers left unresolved by the join",
    )
    .unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of existing records skipped by the join
pub static SKIPPED_RECORDS_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    let counter = Counter::new(
        format!("{METRICS_NAMESPACE}_skipped_records_total"),
        "Total number of existing records skipped by the join",
    )
    .unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a completed run
///
/// # Arguments
/// * `status` - Report status label (`success`, `conflict`, `failed`)
/// * `duration` - Duration of the run
pub fn record_run(status: &str, duration: Duration) {
    RECONCILIATION_TOTAL.with_label_values(&[status]).inc();
    RECONCILIATION_DURATION_SECONDS.observe(duration.as_secs_f64());
}

/// Record a run that ended in an error
///
/// # Arguments
/// * `reason` - Stable reason code of the error
/// * `duration` - Duration of the run before failure
pub fn record_run_error(reason: &str, duration: Duration) {
    RECONCILIATION_TOTAL.with_label_values(&["error"]).inc();
    RECONCILIATION_DURATION_SECONDS.observe(duration.as_secs_f64());
    ERRORS_TOTAL.with_label_values(&[reason]).inc();
}

/// Record one apply outcome by its label
pub fn record_outcome(outcome: &str) {
    RECORD_OUTCOMES_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record the unresolved and skipped counts of a join
pub fn record_join(unresolved: usize, skipped: usize) {
    #[allow(clippy::cast_precision_loss)]
    {
        UNRESOLVED_BROKERS_TOTAL.inc_by(unresolved as f64);
        SKIPPED_RECORDS_TOTAL.inc_by(skipped as f64);
    }
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Returns
/// Prometheus-formatted metrics as a String
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
