//! Stream endpoint integration tests
//!
//! - POST /api/stream - validation order, SSE relay, error events, audit log

use std::time::Duration;

use axum::http::{header, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use courier::audit::LogStatus;

use crate::common::{chat_body, constants, header_str, parse_sse, streamed_text, TestHarness};
use crate::mocks::ProviderTestData;

fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}

#[tokio::test]
async fn test_stream_relays_provider_frames() {
    let harness = TestHarness::new().await;
    let frames = ProviderTestData::content_chunks(&["Hi", " there"], Some((10, 2)));
    let upstream_body = ProviderTestData::sse_body(&frames);
    harness.provider.mock_stream_raw(upstream_body.clone()).await;

    let response = harness.stream(&chat_body("Hello")).await;

    response.assert_status_ok();
    assert_eq!(header_str(&response, "content-type"), Some("text/event-stream"));
    assert_eq!(header_str(&response, "cache-control"), Some("no-cache"));
    assert_eq!(header_str(&response, "x-accel-buffering"), Some("no"));
    assert_eq!(header_str(&response, "x-ratelimit-limit"), Some("100"));
    assert_eq!(header_str(&response, "x-ratelimit-remaining"), Some("99"));

    let relayed = parse_sse(&response.text());
    assert_eq!(streamed_text(&relayed), "Hi there");
    let last = relayed.last().expect("final frame");
    assert_eq!(last.event.as_deref(), Some("final_response"));
    assert_eq!(last.data, json!({"status": "completed"}));

    let logs = harness
        .wait_for_finished_logs(1, Duration::from_secs(2))
        .await;
    assert_eq!(logs.len(), 1);
    let entry = &logs[0];
    assert_eq!(entry.status, LogStatus::Completed);
    assert_eq!(entry.user_id, constants::STUDENT_ID);
    assert_eq!(entry.session_id, "session-1");
    assert_eq!(entry.provider, "api-key");
    assert_eq!(entry.total_tokens, Some(12));
    assert_eq!(entry.bytes_down, upstream_body.len() as u64);
    assert!(entry.bytes_up > 0);
    assert!(entry.request_content.is_none());
}

#[tokio::test]
async fn test_upstream_failure_becomes_error_event() {
    let harness = TestHarness::new().await;
    harness.provider.mock_error(500, "boom").await;

    let response = harness.stream(&chat_body("Hello")).await;

    response.assert_status_ok();
    let relayed = parse_sse(&response.text());
    assert_eq!(relayed.len(), 1);
    assert_eq!(relayed[0].event.as_deref(), Some("error"));
    assert_eq!(
        relayed[0].data,
        json!({"code": "UPSTREAM_ERROR", "message": "AI service error: HTTP 500: boom"})
    );

    let logs = harness
        .wait_for_finished_logs(1, Duration::from_secs(2))
        .await;
    assert_eq!(logs[0].status, LogStatus::Error);
}

#[tokio::test]
async fn test_incomplete_provider_config_is_config_error() {
    let harness = TestHarness::new().await;
    harness.settings.remove("openai_api_key");

    let response = harness.stream(&chat_body("Hello")).await;

    response.assert_status_ok();
    let relayed = parse_sse(&response.text());
    assert_eq!(relayed.len(), 1);
    assert_eq!(relayed[0].event.as_deref(), Some("error"));
    assert_eq!(relayed[0].data["code"], "CONFIG_ERROR");
    assert!(harness.provider.completion_requests().await.is_empty());
    assert!(harness.sink.entries().is_empty());
}

#[tokio::test]
async fn test_course_context_reaches_provider() {
    let harness = TestHarness::new().await;
    harness
        .provider
        .mock_stream(&ProviderTestData::content_chunks(&["ok"], None))
        .await;

    let mut body = chat_body("What is a cell?");
    body["courseid"] = json!(constants::COURSE_ID);
    harness.stream(&body).await.assert_status_ok();

    let requests = harness.provider.completion_requests().await;
    assert_eq!(requests.len(), 1);
    let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(sent["stream"], true);
    assert_eq!(sent["messages"][1]["content"], "What is a cell?");
    assert!(sent["messages"][0]["content"]
        .as_str()
        .unwrap()
        .contains(constants::COURSE_NAME));
    assert_eq!(
        requests[0].headers.get("authorization").unwrap(),
        &format!("Bearer {}", constants::API_KEY)
    );
}

#[tokio::test]
async fn test_missing_usage_falls_back_to_word_count() {
    let harness = TestHarness::new().await;
    harness
        .provider
        .mock_stream(&ProviderTestData::content_chunks(&["one two", " three"], None))
        .await;

    harness.stream(&chat_body("Hello")).await.assert_status_ok();

    let logs = harness
        .wait_for_finished_logs(1, Duration::from_secs(2))
        .await;
    assert_eq!(logs[0].status, LogStatus::Completed);
    assert_eq!(logs[0].tokens_used, Some(3));
    assert!(logs[0].approximate);
}

#[tokio::test]
async fn test_content_logging_is_opt_in() {
    let harness = TestHarness::new().await;
    harness.set("log_content", "1");
    harness
        .provider
        .mock_stream(&ProviderTestData::content_chunks(&["Hi"], None))
        .await;

    harness.stream(&chat_body("Hello")).await.assert_status_ok();

    let logs = harness
        .wait_for_finished_logs(1, Duration::from_secs(2))
        .await;
    assert_eq!(logs[0].request_content.as_deref(), Some("Hello"));
    assert_eq!(logs[0].response_content.as_deref(), Some("Hi"));
}

#[tokio::test]
async fn test_disabled_feature_rejected_before_method() {
    let harness = TestHarness::new().await;
    harness.set("enabled", "0");

    let response = harness
        .server
        .get("/api/stream")
        .add_header(header::AUTHORIZATION, crate::common::bearer(constants::STUDENT_TOKEN))
        .await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(error_code(&response.json()), "FEATURE_DISABLED");
}

#[tokio::test]
async fn test_wrong_method_rejected() {
    let harness = TestHarness::new().await;

    let response = harness
        .server
        .get("/api/stream")
        .add_header(header::AUTHORIZATION, crate::common::bearer(constants::STUDENT_TOKEN))
        .await;

    response.assert_status(StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_accept_header_required() {
    let harness = TestHarness::new().await;

    let response = harness
        .post_as("/api/stream", constants::STUDENT_TOKEN)
        .json(&chat_body("Hello"))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_blank_query_or_session_rejected() {
    let harness = TestHarness::new().await;

    for body in [
        json!({"query": "  ", "session": "s", "sesskey": constants::SESSKEY}),
        json!({"query": "Hi", "sesskey": constants::SESSKEY}),
    ] {
        let response = harness.stream(&body).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&response.json()), "BAD_REQUEST");
    }
}

#[tokio::test]
async fn test_wrong_sesskey_rejected() {
    let harness = TestHarness::new().await;
    let mut body = chat_body("Hello");
    body["sesskey"] = json!("forged");

    let response = harness.stream(&body).await;

    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(error_code(&response.json()), "INVALID_SESSKEY");
}

#[tokio::test]
async fn test_foreign_course_rejected() {
    let harness = TestHarness::new().await;
    let mut body = chat_body("Hello");
    body["courseid"] = json!(999);

    let response = harness.stream(&body).await;

    response.assert_status(StatusCode::FORBIDDEN);
    assert!(harness.provider.completion_requests().await.is_empty());
}
