//! Prometheus metrics endpoint
//!
//! Exposes relay metrics in Prometheus format for monitoring.

use axum::response::IntoResponse;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// Global Prometheus handle for metrics export
static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder (call once at startup)
pub fn init_metrics() -> anyhow::Result<()> {
    PROMETHEUS_HANDLE.get_or_try_init(|| PrometheusBuilder::new().install_recorder())?;
    register_metrics();
    Ok(())
}

fn register_metrics() {
    metrics::describe_counter!("courier_relays_total", "Relayed chat requests by outcome");
    metrics::describe_histogram!(
        "courier_relay_duration_seconds",
        "Relay duration in seconds"
    );
    metrics::describe_histogram!(
        "courier_time_to_first_token_seconds",
        "Latency until the first content delta"
    );
    metrics::describe_counter!("courier_tokens_total", "Tokens reported by providers");
    metrics::describe_counter!(
        "courier_upstream_bytes_total",
        "Bytes exchanged with providers"
    );
    metrics::describe_counter!(
        "courier_rate_limit_rejections_total",
        "Requests rejected by the hourly limit"
    );
    metrics::describe_counter!(
        "courier_token_exchanges_total",
        "OAuth client-credentials exchanges"
    );
}

/// Prometheus metrics endpoint handler
///
/// Renders nothing until [`init_metrics`] has run.
pub async fn prometheus_metrics() -> impl IntoResponse {
    PROMETHEUS_HANDLE
        .get()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

/// Record a finished relay
pub fn record_relay(provider: &str, outcome: &str, duration_secs: f64) {
    metrics::counter!(
        "courier_relays_total",
        "provider" => provider.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    metrics::histogram!("courier_relay_duration_seconds", "provider" => provider.to_string())
        .record(duration_secs);
}

pub fn record_time_to_first_token(provider: &str, seconds: f64) {
    metrics::histogram!(
        "courier_time_to_first_token_seconds",
        "provider" => provider.to_string()
    )
    .record(seconds);
}

/// Record tokens by kind (`prompt`, `completion`, `approximate`)
pub fn record_tokens(provider: &str, kind: &str, count: u64) {
    metrics::counter!(
        "courier_tokens_total",
        "provider" => provider.to_string(),
        "kind" => kind.to_string()
    )
    .increment(count);
}

/// Record provider traffic (`up` or `down`)
pub fn record_upstream_bytes(direction: &str, bytes: u64) {
    metrics::counter!("courier_upstream_bytes_total", "direction" => direction.to_string())
        .increment(bytes);
}

pub fn record_rate_limit_rejection() {
    metrics::counter!("courier_rate_limit_rejections_total").increment(1);
}

/// Record a token exchange (`success`, `rejected`, `invalid`, `network_error`)
pub fn record_token_exchange(outcome: &str) {
    metrics::counter!("courier_token_exchanges_total", "outcome" => outcome.to_string())
        .increment(1);
}
