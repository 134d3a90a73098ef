//! Metrics definitions for the storefront gateway.
//!
//! All metrics follow Prometheus naming conventions:
//! - `gateway_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: 7 values max (GET, POST, PATCH, DELETE, PUT, HEAD, OPTIONS)
//! - `endpoint`: known routes plus `/other`
//! - `status`: success, error, timeout (and a few outcome words per metric)
//! - `reason`: bounded by rejection and verification error variants
//! - `flow`: login, register, identity

use metrics::{counter, histogram};
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
        // HTTP request buckets aligned with a 200ms p95 target
        .set_buckets_for_metric(
            Matcher::Prefix("gateway_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // JWKS fetches go over the internet; wider buckets up to the fetch timeout
        .set_buckets_for_metric(
            Matcher::Prefix("gateway_jwks_fetch".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set JWKS fetch buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `gateway_http_requests_total`, `gateway_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
///
/// This captures ALL HTTP responses including gate rejections and
/// framework-level errors (415, 400, 404, 405).
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("gateway_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("gateway_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint path to prevent label cardinality explosion
///
/// Unknown paths (including everything under the storage prefix) are
/// reported as `/other`.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/" => "/",
        "/health" => "/health",
        "/ready" => "/ready",
        "/metrics" => "/metrics",
        "/api/v1/authentication/login" => "/api/v1/authentication/login",
        "/api/v1/authentication/signin" => "/api/v1/authentication/signin",
        "/api/v1/authentication/oauth/google" => "/api/v1/authentication/oauth/google",
        "/api/v1/authentication/users/me" => "/api/v1/authentication/users/me",
        _ => "/other",
    }
}

// ============================================================================
// Token Metrics
// ============================================================================

/// Record a token validation outcome
///
/// Metric: `gateway_token_validations_total`
/// Labels: `kind` (session, identity), `status` (success, error), `reason`
pub fn record_token_validation(kind: &'static str, reason: Option<&'static str>) {
    let status = if reason.is_some() { "error" } else { "success" };
    counter!("gateway_token_validations_total",
        "kind" => kind,
        "status" => status,
        "reason" => reason.unwrap_or("none")
    )
    .increment(1);
}

/// Record a session token being issued
///
/// Metric: `gateway_tokens_issued_total`
/// Labels: `flow` (login, register, identity)
pub fn record_token_issued(flow: &'static str) {
    counter!("gateway_tokens_issued_total", "flow" => flow).increment(1);
}

/// Record a request gate decision
///
/// Metric: `gateway_gate_decisions_total`
/// Labels: `outcome` (preflight, bypass, authorized, rejected), `reason`
pub fn record_gate_decision(outcome: &'static str, reason: Option<&'static str>) {
    counter!("gateway_gate_decisions_total",
        "outcome" => outcome,
        "reason" => reason.unwrap_or("none")
    )
    .increment(1);
}

// ============================================================================
// JWKS Metrics
// ============================================================================

/// Record a remote key set fetch
///
/// Metric: `gateway_jwks_fetch_total`, `gateway_jwks_fetch_duration_seconds`
/// Labels: `status` (success, error, malformed)
pub fn record_jwks_fetch(status: &'static str, duration: Duration) {
    histogram!("gateway_jwks_fetch_duration_seconds").record(duration.as_secs_f64());
    counter!("gateway_jwks_fetch_total", "status" => status).increment(1);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

    type CounterRow = (String, Vec<(String, String)>, u64);

    fn counters(snapshotter: &Snapshotter) -> Vec<CounterRow> {
        snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter_map(|(key, _, _, value)| match value {
                DebugValue::Counter(count) => {
                    let key = key.key();
                    let labels = key
                        .labels()
                        .map(|l| (l.key().to_string(), l.value().to_string()))
                        .collect();
                    Some((key.name().to_string(), labels, count))
                }
                _ => None,
            })
            .collect()
    }

    fn counter_value(rows: &[CounterRow], name: &str, labels: &[(&str, &str)]) -> Option<u64> {
        rows.iter()
            .find(|(row_name, row_labels, _)| {
                row_name == name
                    && labels
                        .iter()
                        .all(|(k, v)| row_labels.iter().any(|(rk, rv)| rk.as_str() == *k && rv.as_str() == *v))
            })
            .map(|(_, _, count)| *count)
    }

    #[test]
    fn test_categorize_status_code() {
        assert_eq!(categorize_status_code(200), "success");
        assert_eq!(categorize_status_code(204), "success");
        assert_eq!(categorize_status_code(401), "error");
        assert_eq!(categorize_status_code(408), "timeout");
        assert_eq!(categorize_status_code(504), "timeout");
        assert_eq!(categorize_status_code(500), "error");
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("/health"), "/health");
        assert_eq!(
            normalize_endpoint("/api/v1/authentication/users/me"),
            "/api/v1/authentication/users/me"
        );
        assert_eq!(normalize_endpoint("/api/v1/storage/a/b/c.png"), "/other");
        assert_eq!(normalize_endpoint("/api/v1/orders/123"), "/other");
    }

    #[test]
    fn test_record_functions_without_recorder() {
        // Records against the global no-op recorder; must not panic.
        record_http_request("GET", "/health", 200, Duration::from_millis(5));
        record_http_request("POST", "/api/v1/authentication/login", 401, Duration::from_millis(80));
        record_token_validation("session", None);
        record_token_validation("identity", Some("unknown_kid"));
        record_token_issued("login");
        record_gate_decision("rejected", Some("token_missing"));
        record_jwks_fetch("error", Duration::from_millis(5000));
    }

    #[test]
    fn test_gate_decision_counter_labels() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_gate_decision("rejected", Some("token_expired"));
            record_gate_decision("rejected", Some("token_expired"));
            record_gate_decision("bypass", None);
        });

        let rows = counters(&snapshotter);
        assert_eq!(
            counter_value(
                &rows,
                "gateway_gate_decisions_total",
                &[("outcome", "rejected"), ("reason", "token_expired")]
            ),
            Some(2)
        );
        assert_eq!(
            counter_value(
                &rows,
                "gateway_gate_decisions_total",
                &[("outcome", "bypass"), ("reason", "none")]
            ),
            Some(1)
        );
    }

    #[test]
    fn test_token_validation_counter_labels() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_token_validation("identity", Some("signature"));
        });

        let rows = counters(&snapshotter);
        assert_eq!(
            counter_value(
                &rows,
                "gateway_token_validations_total",
                &[("kind", "identity"), ("status", "error"), ("reason", "signature")]
            ),
            Some(1)
        );
    }
}
