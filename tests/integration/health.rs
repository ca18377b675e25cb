//! Health and observability endpoint tests
//!
//! - GET /health - dependency status
//! - GET /health/live - liveness probe
//! - GET /metrics - Prometheus exposition
//! - GET /docs/openapi.json - API description

use pretty_assertions::assert_eq;
use serde_json::Value;

use crate::common::TestHarness;

#[tokio::test]
async fn test_health_reports_cache_backend() {
    let harness = TestHarness::new().await;

    let response = harness.server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["checks"]["cache"]["status"], "healthy");
    assert_eq!(body["checks"]["cache"]["backend"], "memory");
}

#[tokio::test]
async fn test_liveness_needs_no_auth() {
    let harness = TestHarness::new().await;

    let response = harness.server.get("/health/live").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_metrics_endpoint_is_public() {
    courier::routes::metrics::init_metrics().expect("metrics recorder");
    let harness = TestHarness::new().await;

    harness.server.get("/metrics").await.assert_status_ok();
}

#[tokio::test]
async fn test_openapi_lists_relay_paths() {
    let harness = TestHarness::new().await;

    let response = harness.server.get("/docs/openapi.json").await;

    response.assert_status_ok();
    let body: Value = response.json();
    for path in ["/api/stream", "/api/usage", "/api/admin/models"] {
        assert!(body["paths"].get(path).is_some(), "missing {}", path);
    }
}
