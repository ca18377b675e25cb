//! Configuration management for Courier
//!
//! Process configuration is loaded from environment variables once at startup.
//! Provider settings that administrators change at runtime live in
//! [`crate::settings`] instead.

use anyhow::{Context, Result};
use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,

    /// Redis connection URL. Shared state stays in-process when unset.
    pub redis_url: Option<String>,

    /// Identity API base URL used by the HTTP auth gate
    pub identity_api_url: Option<String>,
    /// Service key presented to the identity API
    pub identity_api_key: Option<String>,
    /// Cache TTL for resolved caller identities (in seconds)
    pub identity_cache_ttl_seconds: u64,

    /// Origin allowed to call the stream endpoint from a browser
    pub cors_allowed_origin: Option<String>,

    /// Lifetime of the process-wide settings snapshot (in seconds)
    pub settings_ttl_seconds: u64,

    /// Audit log retention (in days)
    pub log_retention_days: u64,

    /// Total budget for one upstream call (in seconds)
    pub upstream_timeout_seconds: u64,
    /// Connect budget for one upstream call (in seconds)
    pub upstream_connect_timeout_seconds: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("COURIER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("COURIER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid COURIER_PORT")?,

            redis_url: non_empty_var("REDIS_URL"),

            identity_api_url: non_empty_var("IDENTITY_API_URL"),
            identity_api_key: non_empty_var("IDENTITY_API_KEY"),
            identity_cache_ttl_seconds: env::var("IDENTITY_CACHE_TTL_SECONDS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .context("Invalid IDENTITY_CACHE_TTL_SECONDS")?,

            cors_allowed_origin: non_empty_var("CORS_ALLOWED_ORIGIN"),

            settings_ttl_seconds: env::var("SETTINGS_TTL_SECONDS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("Invalid SETTINGS_TTL_SECONDS")?,

            log_retention_days: env::var("LOG_RETENTION_DAYS")
                .unwrap_or_else(|_| "90".to_string())
                .parse()
                .context("Invalid LOG_RETENTION_DAYS")?,

            upstream_timeout_seconds: env::var("UPSTREAM_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .context("Invalid UPSTREAM_TIMEOUT_SECONDS")?,
            upstream_connect_timeout_seconds: env::var("UPSTREAM_CONNECT_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid UPSTREAM_CONNECT_TIMEOUT_SECONDS")?,
        })
    }

    /// Configuration suitable for tests: no Redis, no identity backend
    #[cfg(any(test, feature = "test-utils"))]
    pub fn for_testing() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            redis_url: None,
            identity_api_url: None,
            identity_api_key: None,
            identity_cache_ttl_seconds: 60,
            cors_allowed_origin: None,
            settings_ttl_seconds: 0,
            log_retention_days: 90,
            upstream_timeout_seconds: 10,
            upstream_connect_timeout_seconds: 2,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
