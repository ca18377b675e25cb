//! Common test utilities for Courier
//!
//! Builds a real router over in-memory backends: settings, auth gate, cache
//! and audit sink are all process-local, and the provider is a wiremock
//! server. No Redis or identity service is needed.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::{header, HeaderName, HeaderValue};
use axum_test::{TestRequest, TestServer};
use serde_json::{json, Value};

use courier::audit::{InMemoryLogSink, LogEntry, LogStatus};
use courier::cache::{CacheBackend, InMemoryCache};
use courier::identity::{CallerIdentity, CourseMembership, StaticAuthGate};
use courier::settings::InMemorySettings;
use courier::{routes, AppState, Backends, Config};

use crate::mocks::MockProvider;

/// Test fixtures
pub mod constants {
    pub const STUDENT_TOKEN: &str = "student-session-token";
    pub const ADMIN_TOKEN: &str = "admin-session-token";
    pub const STUDENT_ID: &str = "7";
    pub const ADMIN_ID: &str = "2";
    pub const SESSKEY: &str = "sesskey-abc";
    pub const COURSE_ID: i64 = 42;
    pub const COURSE_NAME: &str = "Biology 101";
    pub const API_KEY: &str = "sk-test";
}

pub fn student() -> CallerIdentity {
    CallerIdentity {
        user_id: constants::STUDENT_ID.to_string(),
        username: "student".to_string(),
        fullname: "Sam Student".to_string(),
        sesskey: constants::SESSKEY.to_string(),
        is_admin: false,
        courses: vec![CourseMembership {
            id: constants::COURSE_ID,
            fullname: constants::COURSE_NAME.to_string(),
        }],
    }
}

pub fn admin() -> CallerIdentity {
    CallerIdentity {
        user_id: constants::ADMIN_ID.to_string(),
        username: "admin".to_string(),
        fullname: "Ada Admin".to_string(),
        sesskey: constants::SESSKEY.to_string(),
        is_admin: true,
        courses: Vec::new(),
    }
}

/// A chat request body accepted by `/api/stream`
pub fn chat_body(query: &str) -> Value {
    json!({
        "query": query,
        "session": "session-1",
        "sesskey": constants::SESSKEY,
    })
}

/// One parsed frame of a relay response
#[derive(Debug, Clone, PartialEq)]
pub struct RelayFrame {
    pub event: Option<String>,
    pub data: Value,
}

/// Split an SSE body into frames
pub fn parse_sse(body: &str) -> Vec<RelayFrame> {
    body.split("\n\n")
        .filter(|block| !block.trim().is_empty())
        .filter_map(|block| {
            let mut event = None;
            let mut data = None;
            for line in block.lines() {
                if let Some(name) = line.strip_prefix("event: ") {
                    event = Some(name.to_string());
                } else if let Some(raw) = line.strip_prefix("data: ") {
                    data = serde_json::from_str(raw).ok();
                }
            }
            data.map(|data| RelayFrame { event, data })
        })
        .collect()
}

/// Concatenated OpenAI delta text of a relay response
pub fn streamed_text(frames: &[RelayFrame]) -> String {
    frames
        .iter()
        .filter_map(|f| f.data["choices"][0]["delta"]["content"].as_str())
        .collect()
}

/// Router over in-memory backends plus a mock provider
///
/// # Example
///
/// ```ignore
/// let harness = TestHarness::new().await;
/// harness.provider.mock_stream(&frames).await;
/// let response = harness.stream(&chat_body("Hello")).await;
/// ```
pub struct TestHarness {
    pub server: TestServer,
    pub provider: MockProvider,
    pub settings: Arc<InMemorySettings>,
    pub gate: Arc<StaticAuthGate>,
    pub sink: Arc<InMemoryLogSink>,
}

impl TestHarness {
    /// API-key provider pointed at the mock, rate limit 100
    pub async fn new() -> Self {
        let provider = MockProvider::start().await;
        let settings = Arc::new(InMemorySettings::with_values([
            ("enabled", "1".to_string()),
            ("provider", "api-key".to_string()),
            ("openai_api_key", constants::API_KEY.to_string()),
            ("openai_api_base", provider.api_base()),
            ("rate_limit", "100".to_string()),
        ]));

        let gate = Arc::new(StaticAuthGate::new());
        gate.insert(constants::STUDENT_TOKEN, student());
        gate.insert(constants::ADMIN_TOKEN, admin());

        let sink = Arc::new(InMemoryLogSink::new());

        let backends = Backends {
            cache: CacheBackend::InMemory(Arc::new(InMemoryCache::new(60))),
            settings: settings.clone(),
            auth_gate: gate.clone(),
            log_sink: sink.clone(),
        };

        let state = Arc::new(AppState::new_for_testing(Config::for_testing(), backends));
        let app = routes::create_router(state);
        let server = TestServer::new(app).expect("Failed to create test server");

        Self {
            server,
            provider,
            settings,
            gate,
            sink,
        }
    }

    pub fn set(&self, key: &str, value: &str) {
        self.settings.set(key, value);
    }

    /// Authenticated stream request with the SSE `Accept` header
    pub fn stream_request(&self, token: &str) -> TestRequest {
        self.server
            .post("/api/stream")
            .add_header(header::AUTHORIZATION, bearer(token))
            .add_header(header::ACCEPT, HeaderValue::from_static("text/event-stream"))
    }

    pub async fn stream(&self, body: &Value) -> axum_test::TestResponse {
        self.stream_request(constants::STUDENT_TOKEN).json(body).await
    }

    pub fn get_as(&self, path: &str, token: &str) -> TestRequest {
        self.server
            .get(path)
            .add_header(header::AUTHORIZATION, bearer(token))
    }

    pub fn post_as(&self, path: &str, token: &str) -> TestRequest {
        self.server
            .post(path)
            .add_header(header::AUTHORIZATION, bearer(token))
    }

    /// Wait until `count` audit entries are finished
    pub async fn wait_for_finished_logs(&self, count: usize, timeout: Duration) -> Vec<LogEntry> {
        let start = Instant::now();
        loop {
            let finished: Vec<LogEntry> = self
                .sink
                .entries()
                .into_iter()
                .filter(|e| e.status != LogStatus::Pending)
                .collect();
            if finished.len() >= count || start.elapsed() > timeout {
                return finished;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

pub fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {}", token)).expect("valid header")
}

pub fn header_str<'a>(response: &'a axum_test::TestResponse, name: &str) -> Option<&'a str> {
    response
        .headers()
        .get(HeaderName::from_bytes(name.as_bytes()).ok()?)
        .and_then(|v| v.to_str().ok())
}
