//! Gatekeeper metrics.
//!
//! All metrics follow Prometheus naming conventions:
//! - `gk_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `outcome`: fixed by code (connected, quarantined, promoted, accepted, ...)
//! - `kind`: bounded by `GatekeeperError::kind`
//! - `status`: success, error
//! - `state`: quarantined, connected

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Verification is dominated by the one-time JWKS fetch; steady state
        // is a single RSA verify.
        .set_buckets_for_metric(
            Matcher::Prefix("gk_token_verification".to_string()),
            &[
                0.0005, 0.001, 0.002, 0.005, 0.010, 0.025, 0.050, 0.100, 0.500, 1.000, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set token verification buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// Admission Metrics
// ============================================================================

/// Record a connection entering a registry state.
///
/// Metric: `gk_admissions_total`
/// Labels: `outcome` (quarantined, connected, promoted)
pub fn record_admission(outcome: &'static str) {
    counter!("gk_admissions_total", "outcome" => outcome).increment(1);
}

/// Record a policy rejection that closed a connection.
///
/// Metric: `gk_rejections_total`
/// Labels: `kind`
pub fn record_rejection(kind: &'static str) {
    counter!("gk_rejections_total", "kind" => kind).increment(1);
}

/// Publish registry set sizes.
///
/// Metric: `gk_connections`
/// Labels: `state`
pub fn set_connections(quarantined: usize, connected: usize) {
    gauge!("gk_connections", "state" => "quarantined").set(quarantined as f64);
    gauge!("gk_connections", "state" => "connected").set(connected as f64);
}

// ============================================================================
// Authentication Metrics
// ============================================================================

/// Record a JWKS fetch attempt.
///
/// Metric: `gk_jwks_fetch_total`
/// Labels: `status`
pub fn record_jwks_fetch(status: &'static str) {
    counter!("gk_jwks_fetch_total", "status" => status).increment(1);
}

/// Record a token verification.
///
/// Metric: `gk_token_verification_duration_seconds`, `gk_token_verifications_total`
/// Labels: `outcome` (accepted, rejected, key_unavailable)
pub fn record_token_verification(outcome: &'static str, duration: Duration) {
    histogram!("gk_token_verification_duration_seconds", "outcome" => outcome)
        .record(duration.as_secs_f64());
    counter!("gk_token_verifications_total", "outcome" => outcome).increment(1);
}

// ============================================================================
// Heartbeat Metrics
// ============================================================================

/// Record a ping that could not be sent.
///
/// Metric: `gk_heartbeat_failures_total`
pub fn record_heartbeat_failure() {
    counter!("gk_heartbeat_failures_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    // These run against the global no-op recorder; they only exercise the
    // recording paths.

    #[test]
    fn test_record_admission_outcomes() {
        record_admission("quarantined");
        record_admission("connected");
        record_admission("promoted");
    }

    #[test]
    fn test_record_token_verification() {
        record_token_verification("accepted", Duration::from_micros(400));
        record_token_verification("rejected", Duration::from_millis(2));
        record_token_verification("key_unavailable", Duration::from_secs(10));
    }

    #[test]
    fn test_heartbeat_failure_is_counted() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_heartbeat_failure();
            record_heartbeat_failure();
        });

        let snapshot = snapshotter.snapshot().into_vec();
        let total: u64 = snapshot
            .iter()
            .filter(|(key, _, _, _)| key.key().name() == "gk_heartbeat_failures_total")
            .map(|(_, _, _, value)| match value {
                DebugValue::Counter(v) => *v,
                _ => 0,
            })
            .sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn test_connection_gauges_by_state() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            set_connections(3, 7);
        });

        let snapshot = snapshotter.snapshot().into_vec();
        let mut states: Vec<(String, f64)> = snapshot
            .iter()
            .filter(|(key, _, _, _)| key.key().name() == "gk_connections")
            .filter_map(|(key, _, _, value)| {
                let state = key
                    .key()
                    .labels()
                    .find(|l| l.key() == "state")?
                    .value()
                    .to_string();
                match value {
                    DebugValue::Gauge(v) => Some((state, v.into_inner())),
                    _ => None,
                }
            })
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));

        assert_eq!(
            states,
            vec![("connected".to_string(), 7.0), ("quarantined".to_string(), 3.0)]
        );
    }
}
