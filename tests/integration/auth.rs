//! Authentication integration tests
//!
//! - Bearer token required on every protected route
//! - HTTP auth gate resolves sessions through the identity API and caches them

use std::sync::Arc;

use axum::http::{header, HeaderValue, StatusCode};
use axum_test::TestServer;
use pretty_assertions::assert_eq;

use courier::audit::InMemoryLogSink;
use courier::cache::{CacheBackend, InMemoryCache};
use courier::identity::{HttpAuthGate, IdentityClient};
use courier::settings::InMemorySettings;
use courier::{routes, AppState, Backends, Config};

use crate::common::{bearer, TestHarness};
use crate::mocks::MockIdentityApi;

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let harness = TestHarness::new().await;

    for path in ["/api/stream", "/api/usage", "/api/admin/models?provider=api-key"] {
        let response = harness.server.get(path).await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn test_unknown_token_is_unauthorized() {
    let harness = TestHarness::new().await;

    let response = harness.get_as("/api/usage", "not-a-session").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_non_bearer_scheme_is_unauthorized() {
    let harness = TestHarness::new().await;

    let response = harness
        .server
        .get("/api/usage")
        .add_header(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_http_gate_resolves_and_caches_sessions() {
    let identity = MockIdentityApi::start().await;
    identity.mock_session("live-token", "31", "key").await;
    identity.mock_unknown_session().await;

    let cache = CacheBackend::InMemory(Arc::new(InMemoryCache::new(60)));
    let client = IdentityClient::new(reqwest::Client::new(), &identity.uri(), None);
    let backends = Backends {
        cache: cache.clone(),
        settings: Arc::new(InMemorySettings::new()),
        auth_gate: Arc::new(HttpAuthGate::new(client, cache, 60)),
        log_sink: Arc::new(InMemoryLogSink::new()),
    };
    let state = Arc::new(AppState::new_for_testing(Config::for_testing(), backends));
    let server = TestServer::new(routes::create_router(state)).expect("Failed to create test server");

    for _ in 0..2 {
        server
            .get("/api/usage")
            .add_header(header::AUTHORIZATION, bearer("live-token"))
            .await
            .assert_status_ok();
    }
    assert_eq!(identity.session_requests().await, 1);

    server
        .get("/api/usage")
        .add_header(header::AUTHORIZATION, bearer("dead-token"))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}
