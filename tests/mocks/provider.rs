//! Mock chat-completions provider
//!
//! Wiremock server speaking the OpenAI-compatible API the relay calls:
//! - POST /v1/chat/completions - streaming (SSE) and plain JSON answers
//! - GET /v1/models - model listing
//! - POST /oauth/token - client-credentials exchange
//!
//! # Example
//!
//! ```rust,ignore
//! let provider = MockProvider::start().await;
//! provider.mock_stream(&ProviderTestData::content_chunks(&["Hi", " there"], Some((10, 2)))).await;
//! // point `openai_api_base` at provider.api_base()
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde_json::{json, Value};
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

pub const COMPLETIONS_PATH: &str = "/v1/chat/completions";
pub const MODELS_PATH: &str = "/v1/models";
pub const TOKEN_PATH: &str = "/oauth/token";

/// Mock provider server wrapper
pub struct MockProvider {
    server: MockServer,
}

impl MockProvider {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Value for the `openai_api_base` setting
    pub fn api_base(&self) -> String {
        format!("{}/v1", self.server.uri())
    }

    /// Full completions URL, usable as a `custom_endpoint` setting
    pub fn completions_url(&self) -> String {
        format!("{}{}", self.server.uri(), COMPLETIONS_PATH)
    }

    pub fn token_url(&self) -> String {
        format!("{}{}", self.server.uri(), TOKEN_PATH)
    }

    pub async fn received_requests(&self) -> Vec<wiremock::Request> {
        self.server.received_requests().await.unwrap_or_default()
    }

    /// Requests that reached the completions endpoint
    pub async fn completion_requests(&self) -> Vec<wiremock::Request> {
        self.received_requests()
            .await
            .into_iter()
            .filter(|r| r.url.path() == COMPLETIONS_PATH)
            .collect()
    }

    // =========================================================================
    // POST /v1/chat/completions
    // =========================================================================

    /// Stream the given SSE body
    pub async fn mock_stream_raw(&self, body: impl Into<String>) {
        Mock::given(method("POST"))
            .and(path(COMPLETIONS_PATH))
            .and(header("Accept", "text/event-stream"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(body.into(), "text/event-stream")
                    .insert_header("Cache-Control", "no-cache"),
            )
            .mount(&self.server)
            .await;
    }

    /// Stream the given frames, terminated by `[DONE]`
    pub async fn mock_stream(&self, frames: &[Value]) {
        self.mock_stream_raw(ProviderTestData::sse_body(frames)).await;
    }

    /// Fail every completions call with `status` and a plain-text body
    pub async fn mock_error(&self, status: u16, body: &str) {
        Mock::given(method("POST"))
            .and(path(COMPLETIONS_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    /// Non-streaming answer, as used by connection tests
    pub async fn mock_completion_json(&self) {
        Mock::given(method("POST"))
            .and(path(COMPLETIONS_PATH))
            .and(header("Accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-test",
                "object": "chat.completion",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "Hello!"},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 9, "completion_tokens": 2, "total_tokens": 11}
            })))
            .mount(&self.server)
            .await;
    }

    // =========================================================================
    // GET /v1/models
    // =========================================================================

    pub async fn mock_models(&self, ids: &[(&str, i64)]) {
        let data: Vec<Value> = ids
            .iter()
            .map(|(id, created)| json!({"id": id, "object": "model", "created": created}))
            .collect();
        Mock::given(method("GET"))
            .and(path(MODELS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": data})))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_models_unavailable(&self) {
        Mock::given(method("GET"))
            .and(path(MODELS_PATH))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&self.server)
            .await;
    }

    // =========================================================================
    // POST /oauth/token
    // =========================================================================

    /// Issue a JWT access token expiring `expires_in` seconds from now
    pub async fn mock_token_exchange(&self, expires_in: i64) -> String {
        let token = ProviderTestData::jwt(chrono::Utc::now().timestamp() + expires_in);
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"access_token": token})),
            )
            .mount(&self.server)
            .await;
        token
    }
}

/// Factories for provider payloads
pub struct ProviderTestData;

impl ProviderTestData {
    /// OpenAI-style delta frames, optionally followed by a usage frame
    pub fn content_chunks(parts: &[&str], usage: Option<(u64, u64)>) -> Vec<Value> {
        let mut frames: Vec<Value> = parts
            .iter()
            .map(|part| json!({"choices": [{"index": 0, "delta": {"content": part}}]}))
            .collect();
        if let Some((prompt, completion)) = usage {
            frames.push(json!({
                "choices": [],
                "usage": {
                    "prompt_tokens": prompt,
                    "completion_tokens": completion,
                    "total_tokens": prompt + completion
                }
            }));
        }
        frames
    }

    pub fn sse_body(frames: &[Value]) -> String {
        let mut body: String = frames
            .iter()
            .map(|frame| format!("data: {}\n\n", frame))
            .collect();
        body.push_str("data: [DONE]\n\n");
        body
    }

    /// Unsigned JWT with an `exp` claim
    pub fn jwt(exp: i64) -> String {
        format!(
            "eyJhbGciOiJub25lIn0.{}.sig",
            URL_SAFE_NO_PAD.encode(json!({"exp": exp}).to_string())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_stream_serves_sse() {
        let provider = MockProvider::start().await;
        provider
            .mock_stream(&ProviderTestData::content_chunks(&["Hi"], None))
            .await;

        let response = reqwest::Client::new()
            .post(format!("{}{}", provider.uri(), COMPLETIONS_PATH))
            .header("Accept", "text/event-stream")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        let body = response.text().await.unwrap();
        assert!(body.contains("\"content\":\"Hi\""));
        assert!(body.ends_with("data: [DONE]\n\n"));
    }

    #[test]
    fn test_usage_frame_totals() {
        let frames = ProviderTestData::content_chunks(&["a"], Some((10, 2)));
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1]["usage"]["total_tokens"], 12);
    }
}
