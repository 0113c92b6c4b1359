//! Metrics definitions for the token bridge.
//!
//! All metrics follow Prometheus naming conventions:
//! - `bridge_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `status`: success, error (handshake adds `challenged`)
//! - `error_category`: one value per `ValidationError` kind, or `none`

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle used by the
/// `/metrics` endpoint.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Issuance is an HMAC over a few hundred bytes; sub-millisecond buckets
        .set_buckets_for_metric(
            Matcher::Prefix("bridge_token_issuance".to_string()),
            &[
                0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.010, 0.025, 0.050,
            ],
        )
        .map_err(|e| format!("Failed to set token issuance buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

/// Record token issuance duration and outcome.
///
/// Metric: `bridge_token_issuance_duration_seconds`, `bridge_token_issuance_total`
/// Labels: `status`
pub fn record_token_issuance(status: &'static str, duration: Duration) {
    histogram!("bridge_token_issuance_duration_seconds", "status" => status)
        .record(duration.as_secs_f64());

    counter!("bridge_token_issuance_total", "status" => status).increment(1);
}

/// Record token validation result.
///
/// Metric: `bridge_token_validations_total`
/// Labels: `status`, `error_category`
pub fn record_token_validation(status: &'static str, error_category: Option<&'static str>) {
    let category = error_category.unwrap_or("none");
    counter!("bridge_token_validations_total", "status" => status, "error_category" => category)
        .increment(1);
}

/// Record a handshake middleware decision.
///
/// Metric: `bridge_handshake_total`
/// Labels: `status`
pub fn record_handshake(status: &'static str) {
    counter!("bridge_handshake_total", "status" => status).increment(1);
}
