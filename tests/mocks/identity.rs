//! Mock identity API
//!
//! Answers `GET /api/v1/session` for the HTTP auth gate.

use serde_json::json;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

pub struct MockIdentityApi {
    server: MockServer,
}

impl MockIdentityApi {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Resolve `token` to a student enrolled in course 42
    pub async fn mock_session(&self, token: &str, user_id: &str, sesskey: &str) {
        Mock::given(method("GET"))
            .and(path("/api/v1/session"))
            .and(header("Authorization", format!("Bearer {}", token).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {
                    "user_id": user_id,
                    "username": "student",
                    "fullname": "Sam Student",
                    "sesskey": sesskey,
                    "is_admin": false,
                    "courses": [{"id": 42, "fullname": "Biology 101"}]
                }
            })))
            .mount(&self.server)
            .await;
    }

    /// Reject every other token
    pub async fn mock_unknown_session(&self) {
        Mock::given(method("GET"))
            .and(path("/api/v1/session"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&self.server)
            .await;
    }

    pub async fn session_requests(&self) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .len()
    }
}
