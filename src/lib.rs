//! Courier - streaming relay for AI chat completions
//!
//! This library provides the core functionality for the Courier server.
//! It authenticates browser chat sessions, resolves provider credentials,
//! relays upstream SSE streams and records an audit log of every exchange.

pub mod audit;
pub mod cache;
pub mod client;
pub mod config;
pub mod docs;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod provider;
pub mod relay;
pub mod routes;
pub mod settings;
pub mod streaming;
pub mod upstream;
pub mod usage;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{info, warn};

use crate::audit::{InMemoryLogSink, LogSink, RedisLogSink};
use crate::cache::{CacheBackend, InMemoryCache, RedisCache};
use crate::identity::{AuthGate, HttpAuthGate, IdentityClient, StaticAuthGate};
use crate::settings::{EnvSettings, RedisSettings, SettingsSource};

pub use crate::audit::AuditLog;
pub use crate::config::Config;
pub use crate::middleware::RateLimiter;
pub use crate::provider::{CredentialResolver, TokenManager};
pub use crate::relay::SessionRelay;
pub use crate::settings::SettingsCache;
pub use crate::upstream::UpstreamClient;

/// Application state shared across all request handlers
pub struct AppState {
    pub config: Config,
    pub cache: CacheBackend,
    pub settings: SettingsCache,
    pub auth_gate: Arc<dyn AuthGate>,
    pub resolver: CredentialResolver,
    pub upstream: UpstreamClient,
    pub relay: SessionRelay,
    pub audit: AuditLog,
    pub rate_limiter: RateLimiter,
    pub start_time: Instant,
}

/// Replaceable collaborators
pub struct Backends {
    pub cache: CacheBackend,
    pub settings: Arc<dyn SettingsSource>,
    pub auth_gate: Arc<dyn AuthGate>,
    pub log_sink: Arc<dyn LogSink>,
}

impl AppState {
    /// Create a new application state
    pub async fn new(config: Config) -> Result<Self> {
        // Shared client for identity lookups and token exchanges
        let http_client = reqwest::Client::builder()
            .pool_max_idle_per_host(100)
            .timeout(Duration::from_secs(config.upstream_timeout_seconds))
            .build()?;

        let backends = match config.redis_url.as_deref() {
            Some(url) => {
                let redis_client = redis::Client::open(url)?;
                let redis = redis::aio::ConnectionManager::new(redis_client).await?;
                info!("Using Redis for shared state");

                let cache = CacheBackend::Redis(Arc::new(RedisCache::new(
                    redis.clone(),
                    config.identity_cache_ttl_seconds,
                )));
                Backends {
                    auth_gate: auth_gate(&config, http_client.clone(), cache.clone()),
                    cache,
                    settings: Arc::new(RedisSettings::new(redis.clone())),
                    log_sink: Arc::new(RedisLogSink::new(redis)),
                }
            }
            None => {
                warn!("REDIS_URL not set; shared state and audit log stay in-process");
                let cache = CacheBackend::InMemory(Arc::new(InMemoryCache::new(
                    config.identity_cache_ttl_seconds,
                )));
                Backends {
                    auth_gate: auth_gate(&config, http_client.clone(), cache.clone()),
                    cache,
                    settings: Arc::new(EnvSettings),
                    log_sink: Arc::new(InMemoryLogSink::new()),
                }
            }
        };

        let upstream = UpstreamClient::new(&config)?;
        Ok(Self::assemble(config, backends, http_client, upstream))
    }

    /// Application state over caller-supplied backends.
    ///
    /// Nothing touches the network until a request needs it.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn new_for_testing(config: Config, backends: Backends) -> Self {
        let http_client = reqwest::Client::new();
        let upstream = UpstreamClient::from_client(http_client.clone());
        Self::assemble(config, backends, http_client, upstream)
    }

    fn assemble(
        config: Config,
        backends: Backends,
        http_client: reqwest::Client,
        upstream: UpstreamClient,
    ) -> Self {
        let Backends {
            cache,
            settings,
            auth_gate,
            log_sink,
        } = backends;

        let resolver = CredentialResolver::new(TokenManager::new(http_client, cache.clone()));
        let audit = AuditLog::new(log_sink);
        let relay = SessionRelay::new(resolver.clone(), upstream.clone(), audit.clone());

        Self {
            settings: SettingsCache::new(settings, config.settings_ttl_seconds),
            rate_limiter: RateLimiter::new(cache.clone()),
            config,
            cache,
            auth_gate,
            resolver,
            upstream,
            relay,
            audit,
            start_time: Instant::now(),
        }
    }
}

fn auth_gate(config: &Config, http_client: reqwest::Client, cache: CacheBackend) -> Arc<dyn AuthGate> {
    match config.identity_api_url.as_deref() {
        Some(url) => {
            let client = IdentityClient::new(http_client, url, config.identity_api_key.clone());
            Arc::new(HttpAuthGate::new(client, cache, config.identity_cache_ttl_seconds))
        }
        None => {
            warn!("IDENTITY_API_URL not set; every authenticated request will be rejected");
            Arc::new(StaticAuthGate::new())
        }
    }
}
