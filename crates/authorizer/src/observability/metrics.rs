//! Metrics definitions for the authorizer.
//!
//! All metrics follow Prometheus naming conventions:
//! - `authorizer_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `effect`: 2 values (Allow, Deny)
//! - `reason`: `allowed` or an `AuthzError::kind()` label
//! - `status`: 2 values (success, error)

use crate::policy::Effect;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and return its render handle.
///
/// # Errors
///
/// Fails if a recorder is already installed or bucket configuration is
/// rejected.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Decisions are dominated by the cached path; cold fetches land in the tail
        .set_buckets_for_metric(
            Matcher::Prefix("authorizer_decision".to_string()),
            &[
                0.001, 0.002, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500,
            ],
        )
        .map_err(|e| format!("Failed to set decision buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("authorizer_identity_lookup".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set identity lookup buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

/// Record a completed decision.
///
/// Metric: `authorizer_decisions_total`, `authorizer_decision_duration_seconds`
/// Labels: `effect`, `reason` (counter only)
pub fn record_decision(effect: Effect, reason: &'static str, duration: Duration) {
    histogram!("authorizer_decision_duration_seconds",
        "effect" => effect.as_str()
    )
    .record(duration.as_secs_f64());

    counter!("authorizer_decisions_total",
        "effect" => effect.as_str(),
        "reason" => reason
    )
    .increment(1);
}

/// Record a key-distribution fetch.
///
/// Metric: `authorizer_jwks_fetches_total`
/// Labels: `status`
pub fn record_jwks_fetch(status: &'static str) {
    counter!("authorizer_jwks_fetches_total", "status" => status).increment(1);
}

/// Record an identity lookup.
///
/// Metric: `authorizer_identity_lookups_total`,
/// `authorizer_identity_lookup_duration_seconds`
/// Labels: `status`
pub fn record_identity_lookup(status: &'static str, duration: Duration) {
    histogram!("authorizer_identity_lookup_duration_seconds",
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("authorizer_identity_lookups_total", "status" => status).increment(1);
}
