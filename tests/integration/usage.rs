//! Usage endpoint integration tests
//!
//! - GET /api/usage aggregates the caller's audit entries of the last week

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::Value;

use crate::common::{chat_body, constants, TestHarness};
use crate::mocks::ProviderTestData;

#[tokio::test]
async fn test_usage_starts_empty() {
    let harness = TestHarness::new().await;

    let response = harness.get_as("/api/usage", constants::STUDENT_TOKEN).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["total_requests"], 0);
    assert_eq!(body["total_tokens"], 0);
}

#[tokio::test]
async fn test_usage_counts_relayed_requests() {
    let harness = TestHarness::new().await;
    harness
        .provider
        .mock_stream(&ProviderTestData::content_chunks(&["Hi"], Some((10, 2))))
        .await;

    for _ in 0..2 {
        harness.stream(&chat_body("Hello")).await.assert_status_ok();
    }
    harness
        .wait_for_finished_logs(2, Duration::from_secs(2))
        .await;

    let body: Value = harness
        .get_as("/api/usage", constants::STUDENT_TOKEN)
        .await
        .json();
    assert_eq!(body["total_requests"], 2);
    assert_eq!(body["successful_requests"], 2);
    assert_eq!(body["failed_requests"], 0);
    assert_eq!(body["total_tokens"], 24);

    // Other callers see only their own entries
    let admin: Value = harness
        .get_as("/api/usage", constants::ADMIN_TOKEN)
        .await
        .json();
    assert_eq!(admin["total_requests"], 0);
}
