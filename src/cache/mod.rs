//! Cache module
//!
//! Shared, TTL-bounded state: OAuth access tokens, caller identities and
//! request windows for rate limiting. Redis backs multi-instance
//! deployments; the in-memory backend serves single instances and tests.

pub mod in_memory;
pub mod redis;

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::AppResult;

pub use self::in_memory::InMemoryCache;
pub use self::redis::RedisCache;

/// Outcome of recording one hit in a sliding window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHit {
    /// Hits currently inside the window (including this one when accepted)
    pub count: u64,
    /// Whether the hit fit inside the limit
    pub accepted: bool,
    /// Timestamp of the oldest hit still in the window
    pub oldest_ms: Option<i64>,
}

/// Cache backend shared by every component that needs cross-request state
#[derive(Clone)]
pub enum CacheBackend {
    /// Redis-based cache for multi-instance deployments
    Redis(Arc<RedisCache>),
    /// Process-local cache
    InMemory(Arc<InMemoryCache>),
}

impl CacheBackend {
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>> {
        match self {
            CacheBackend::Redis(cache) => cache.get(key).await,
            CacheBackend::InMemory(cache) => cache.get(key).await,
        }
    }

    pub async fn set_with_ttl<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: u64,
    ) -> AppResult<()> {
        match self {
            CacheBackend::Redis(cache) => cache.set_with_ttl(key, value, ttl_seconds).await,
            CacheBackend::InMemory(cache) => cache.set_with_ttl(key, value, ttl_seconds).await,
        }
    }

    pub async fn delete(&self, key: &str) -> AppResult<()> {
        match self {
            CacheBackend::Redis(cache) => cache.delete(key).await,
            CacheBackend::InMemory(cache) => cache.delete(key).await,
        }
    }

    pub async fn delete_prefix(&self, prefix: &str) -> AppResult<u64> {
        match self {
            CacheBackend::Redis(cache) => cache.delete_prefix(prefix).await,
            CacheBackend::InMemory(cache) => cache.delete_prefix(prefix).await,
        }
    }

    pub async fn window_hit(
        &self,
        key: &str,
        now_ms: i64,
        window_ms: i64,
        limit: u64,
    ) -> AppResult<WindowHit> {
        match self {
            CacheBackend::Redis(cache) => cache.window_hit(key, now_ms, window_ms, limit).await,
            CacheBackend::InMemory(cache) => cache.window_hit(key, now_ms, window_ms, limit).await,
        }
    }

    /// Backend name for health reporting
    pub fn kind(&self) -> &'static str {
        match self {
            CacheBackend::Redis(_) => "redis",
            CacheBackend::InMemory(_) => "memory",
        }
    }

    /// Health probe; the in-memory backend is always reachable
    pub async fn ping(&self) -> AppResult<()> {
        match self {
            CacheBackend::Redis(cache) => cache.ping().await,
            CacheBackend::InMemory(_) => Ok(()),
        }
    }
}

/// Cache key prefixes
pub mod keys {
    /// Prefix shared by every OAuth token entry
    pub const OAUTH_TOKEN_PREFIX: &str = "courier:oauth_token:";

    /// OAuth access token for one provider instance
    pub fn oauth_token(instance: &str) -> String {
        format!("{}{}", OAUTH_TOKEN_PREFIX, instance)
    }

    /// Caller identity resolved from a bearer token hash
    pub fn identity(token_hash: &str) -> String {
        format!("courier:identity:{}", token_hash)
    }

    /// Hourly request window of one user
    pub fn rate_window(user_id: &str) -> String {
        format!("courier:ratelimit:{}", user_id)
    }
}
