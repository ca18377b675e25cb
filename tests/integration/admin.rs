//! Admin endpoint integration tests
//!
//! - POST /api/admin/connection-test
//! - GET /api/admin/models
//! - POST /api/admin/cache/clear

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::{chat_body, constants, TestHarness};
use crate::mocks::ProviderTestData;

fn model_ids(body: &Value) -> Vec<&str> {
    body["models"]
        .as_array()
        .map(|models| models.iter().filter_map(|m| m["id"].as_str()).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_connection_test_success() {
    let harness = TestHarness::new().await;
    harness.provider.mock_completion_json().await;

    let response = harness
        .post_as("/api/admin/connection-test", constants::ADMIN_TOKEN)
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["mode"], "api-key");
    assert_eq!(body["message"], "API connection successful");

    let requests = harness.provider.completion_requests().await;
    let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(sent["stream"], false);
    assert_eq!(sent["messages"][1]["content"], "Hello, this is a test message.");
}

#[tokio::test]
async fn test_connection_test_reports_upstream_failure() {
    let harness = TestHarness::new().await;
    harness.provider.mock_error(401, "invalid api key").await;

    let response = harness
        .post_as("/api/admin/connection-test", constants::ADMIN_TOKEN)
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("401"));
}

#[tokio::test]
async fn test_connection_test_provider_override() {
    let harness = TestHarness::new().await;
    harness.set("custom_endpoint", &harness.provider.completions_url());
    harness.provider.mock_completion_json().await;

    let response = harness
        .post_as("/api/admin/connection-test", constants::ADMIN_TOKEN)
        .json(&json!({"provider": "custom-endpoint"}))
        .await;

    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["mode"], "custom-endpoint");
}

#[tokio::test]
async fn test_admin_routes_require_admin() {
    let harness = TestHarness::new().await;

    harness
        .post_as("/api/admin/connection-test", constants::STUDENT_TOKEN)
        .await
        .assert_status(StatusCode::FORBIDDEN);
    harness
        .get_as("/api/admin/models?provider=api-key", constants::STUDENT_TOKEN)
        .await
        .assert_status(StatusCode::FORBIDDEN);
    harness
        .post_as("/api/admin/cache/clear", constants::STUDENT_TOKEN)
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_models_lists_chat_models_newest_first() {
    let harness = TestHarness::new().await;
    harness
        .provider
        .mock_models(&[
            ("gpt-4o", 1),
            ("gpt-3.5-turbo-instruct", 2),
            ("dall-e-3", 3),
            ("gpt-4o-mini", 4),
        ])
        .await;

    let response = harness
        .get_as("/api/admin/models?provider=api-key", constants::ADMIN_TOKEN)
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(model_ids(&body), vec!["gpt-4o-mini", "gpt-4o"]);
}

#[tokio::test]
async fn test_custom_models_fall_back_to_defaults() {
    let harness = TestHarness::new().await;
    harness.set("custom_endpoint", &harness.provider.completions_url());
    harness.provider.mock_models_unavailable().await;

    let response = harness
        .get_as("/api/admin/models?provider=custom-endpoint", constants::ADMIN_TOKEN)
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    let ids = model_ids(&body);
    assert_eq!(ids.len(), 6);
    assert!(ids.iter().all(|id| id.starts_with("meta-llama/")));
}

#[tokio::test]
async fn test_models_rejects_oauth_provider() {
    let harness = TestHarness::new().await;

    harness
        .get_as(
            "/api/admin/models?provider=oauth-client-credentials",
            constants::ADMIN_TOKEN,
        )
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cache_clear_drops_oauth_tokens() {
    let harness = TestHarness::new().await;
    harness.set("provider", "oauth-client-credentials");
    harness.set("token_url", &harness.provider.token_url());
    harness.set("client_id", "client");
    harness.set("client_secret", "secret");
    harness.set("base_url", &harness.provider.api_base());
    let token = harness.provider.mock_token_exchange(3600).await;
    harness
        .provider
        .mock_stream(&ProviderTestData::content_chunks(&["ok"], None))
        .await;

    harness.stream(&chat_body("Hello")).await.assert_status_ok();
    let requests = harness.provider.completion_requests().await;
    assert_eq!(
        requests[0].headers.get("authorization").unwrap(),
        &format!("Bearer {}", token)
    );

    let response = harness
        .post_as("/api/admin/cache/clear", constants::ADMIN_TOKEN)
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body, json!({"success": true, "tokens_cleared": 1}));
}
