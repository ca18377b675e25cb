//! Rate limiting integration tests
//!
//! - N requests per hour pass, request N+1 gets 429 with `Retry-After`
//! - Limits are per user and `<= 0` disables them

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::Value;

use crate::common::{chat_body, header_str, student, TestHarness};
use crate::mocks::ProviderTestData;

async fn harness_with_limit(limit: &str) -> TestHarness {
    let harness = TestHarness::new().await;
    harness.set("rate_limit", limit);
    harness
        .provider
        .mock_stream(&ProviderTestData::content_chunks(&["ok"], None))
        .await;
    harness
}

#[tokio::test]
async fn test_request_after_limit_is_rejected() {
    for limit in [1u32, 3, 10] {
        let harness = harness_with_limit(&limit.to_string()).await;

        for n in 1..=limit {
            let response = harness.stream(&chat_body("Hello")).await;
            response.assert_status_ok();
            let remaining = (limit - n).to_string();
            assert_eq!(
                header_str(&response, "x-ratelimit-remaining"),
                Some(remaining.as_str())
            );
        }

        let response = harness.stream(&chat_body("Hello")).await;
        response.assert_status(StatusCode::TOO_MANY_REQUESTS);
        assert!(header_str(&response, "retry-after").is_some());
        assert_eq!(header_str(&response, "x-ratelimit-remaining"), Some("0"));

        let body: Value = response.json();
        assert_eq!(body["error"]["code"], "RATE_LIMIT_EXCEEDED");
        assert_eq!(
            body["error"]["message"],
            format!("Rate limit exceeded. Maximum {} requests per hour.", limit)
        );

        assert_eq!(
            harness.provider.completion_requests().await.len(),
            limit as usize
        );
    }
}

#[tokio::test]
async fn test_limits_are_per_user() {
    let harness = harness_with_limit("1").await;
    let mut other = student();
    other.user_id = "8".to_string();
    harness.gate.insert("other-token", other);

    harness.stream(&chat_body("Hello")).await.assert_status_ok();
    harness
        .stream(&chat_body("Hello"))
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);

    harness
        .stream_request("other-token")
        .json(&chat_body("Hello"))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_non_positive_limit_is_unlimited() {
    let harness = harness_with_limit("0").await;

    for _ in 0..5 {
        harness.stream(&chat_body("Hello")).await.assert_status_ok();
    }
    assert_eq!(harness.provider.completion_requests().await.len(), 5);
}
