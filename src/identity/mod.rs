//! Caller authentication
//!
//! The host platform owns user sessions. An [`AuthGate`] turns the bearer
//! token a browser presents into a [`CallerIdentity`] carrying the session
//! key and course memberships the relay validates against.

pub mod client;
pub mod models;

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use crate::cache::{keys, CacheBackend};
use crate::error::{AppError, AppResult};

pub use client::IdentityClient;
pub use models::{CallerIdentity, CourseMembership};

/// Hash a bearer token for use as a cache key
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Resolves bearer tokens into callers
#[async_trait]
pub trait AuthGate: Send + Sync {
    async fn authenticate(&self, token: &str) -> AppResult<CallerIdentity>;
}

/// Auth gate backed by the identity API, with cached lookups
pub struct HttpAuthGate {
    client: IdentityClient,
    cache: CacheBackend,
    ttl_seconds: u64,
}

impl HttpAuthGate {
    pub fn new(client: IdentityClient, cache: CacheBackend, ttl_seconds: u64) -> Self {
        Self {
            client,
            cache,
            ttl_seconds,
        }
    }
}

#[async_trait]
impl AuthGate for HttpAuthGate {
    #[instrument(skip_all)]
    async fn authenticate(&self, token: &str) -> AppResult<CallerIdentity> {
        let cache_key = keys::identity(&hash_token(token));

        if let Some(identity) = self.cache.get::<CallerIdentity>(&cache_key).await? {
            debug!(user_id = %identity.user_id, "Cache hit for session");
            return Ok(identity);
        }

        let identity = self.client.fetch_session(token).await?;
        self.cache
            .set_with_ttl(&cache_key, &identity, self.ttl_seconds)
            .await?;

        Ok(identity)
    }
}

/// Fixed token → identity table
///
/// Used when no identity API is configured and by the test suites.
#[derive(Default)]
pub struct StaticAuthGate {
    sessions: RwLock<HashMap<String, CallerIdentity>>,
}

impl StaticAuthGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, token: impl Into<String>, identity: CallerIdentity) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.into(), identity);
    }
}

#[async_trait]
impl AuthGate for StaticAuthGate {
    async fn authenticate(&self, token: &str) -> AppResult<CallerIdentity> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(token)
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::cache::InMemoryCache;
    use wiremock::{
        matchers::{header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn identity() -> CallerIdentity {
        CallerIdentity {
            user_id: "7".into(),
            username: "student".into(),
            fullname: "Sam Student".into(),
            sesskey: "sk".into(),
            is_admin: false,
            courses: vec![],
        }
    }

    #[test]
    fn test_hash_token() {
        let hash = hash_token("test-token");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_token("test-token"));
    }

    #[tokio::test]
    async fn test_static_gate() {
        let gate = StaticAuthGate::new();
        gate.insert("good", identity());

        assert_eq!(gate.authenticate("good").await.unwrap().user_id, "7");
        assert!(matches!(
            gate.authenticate("bad").await,
            Err(AppError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_http_gate_caches_sessions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/session"))
            .and(header("Authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": identity()
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gate = HttpAuthGate::new(
            IdentityClient::new(reqwest::Client::new(), &server.uri(), None),
            CacheBackend::InMemory(Arc::new(InMemoryCache::new(60))),
            60,
        );

        assert_eq!(gate.authenticate("tok").await.unwrap(), identity());
        assert_eq!(gate.authenticate("tok").await.unwrap(), identity());
    }

    #[tokio::test]
    async fn test_http_gate_rejects_unknown_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/session"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let gate = HttpAuthGate::new(
            IdentityClient::new(reqwest::Client::new(), &server.uri(), None),
            CacheBackend::InMemory(Arc::new(InMemoryCache::new(60))),
            60,
        );

        assert!(matches!(
            gate.authenticate("tok").await,
            Err(AppError::Unauthorized)
        ));
    }
}
