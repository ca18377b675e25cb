//! Runtime settings
//!
//! Provider selection, credentials and chat limits are read from an external
//! [`SettingsSource`] on every request. [`SettingsCache`] keeps a short-lived
//! process-wide snapshot; [`RequestSettings`] pins one snapshot for the
//! duration of a single request so every lookup within that request agrees.

mod source;

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::AppResult;

pub use source::{
    EnvSettings, InMemorySettings, RedisSettings, SettingsSource, ENV_PREFIX, SETTINGS_HASH_KEY,
};

/// Setting names
pub mod keys {
    pub const ENABLED: &str = "enabled";
    pub const PROVIDER: &str = "provider";

    pub const OPENAI_API_KEY: &str = "openai_api_key";
    pub const OPENAI_API_BASE: &str = "openai_api_base";
    pub const OPENAI_MODEL: &str = "openai_model";
    pub const OPENAI_ORGANIZATION: &str = "openai_organization";
    pub const OPENAI_PROJECT: &str = "openai_project";

    pub const TOKEN_URL: &str = "token_url";
    pub const CLIENT_ID: &str = "client_id";
    pub const CLIENT_SECRET: &str = "client_secret";
    pub const BASE_URL: &str = "base_url";
    pub const APP_ID: &str = "app_id";
    pub const OAUTH_SCOPE: &str = "oauth_scope";
    pub const OAUTH_INSTANCE: &str = "oauth_instance";

    pub const CUSTOM_ENDPOINT: &str = "custom_endpoint";
    pub const CUSTOM_API_KEY: &str = "custom_api_key";
    pub const CUSTOM_MODEL: &str = "custom_model";
    pub const CUSTOM_HEADERS: &str = "custom_headers";

    pub const MAX_TOKENS: &str = "max_tokens";
    pub const TEMPERATURE: &str = "temperature";
    pub const RATE_LIMIT: &str = "rate_limit";
    pub const ENABLE_LOGGING: &str = "enable_logging";
    pub const LOG_CONTENT: &str = "log_content";
}

struct Snapshot {
    loaded_at: Instant,
    values: Arc<HashMap<String, String>>,
}

/// Process-wide, briefly cached view of the settings source
pub struct SettingsCache {
    source: Arc<dyn SettingsSource>,
    ttl: Duration,
    snapshot: RwLock<Option<Snapshot>>,
}

impl SettingsCache {
    pub fn new(source: Arc<dyn SettingsSource>, ttl_seconds: u64) -> Self {
        Self {
            source,
            ttl: Duration::from_secs(ttl_seconds),
            snapshot: RwLock::new(None),
        }
    }

    /// Current settings, reloading when the snapshot is older than the TTL
    pub async fn snapshot(&self) -> AppResult<Arc<HashMap<String, String>>> {
        if !self.ttl.is_zero() {
            let guard = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(snapshot) = guard.as_ref() {
                if snapshot.loaded_at.elapsed() < self.ttl {
                    return Ok(snapshot.values.clone());
                }
            }
        }

        let values = Arc::new(self.source.load_all().await?);
        debug!(
            source = self.source.name(),
            count = values.len(),
            "Loaded settings"
        );

        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Some(Snapshot {
            loaded_at: Instant::now(),
            values: values.clone(),
        });

        Ok(values)
    }

    /// Settings pinned for one request
    pub async fn for_request(&self) -> AppResult<RequestSettings> {
        Ok(RequestSettings {
            values: self.snapshot().await?,
        })
    }

    /// Drop the cached snapshot so the next request reloads
    pub fn purge(&self) {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Request-scoped settings
#[derive(Debug, Clone)]
pub struct RequestSettings {
    values: Arc<HashMap<String, String>>,
}

impl RequestSettings {
    /// Build from literal values
    pub fn from_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: Arc::new(
                values
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Trimmed, non-empty value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    /// Boolean setting (`1`, `true`, `yes`, `on` are truthy)
    pub fn flag(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(v) => matches!(
                v.to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            ),
            None => default,
        }
    }

    /// Numeric setting; unparsable values fall back to the default
    pub fn number<T: FromStr>(&self, key: &str, default: T) -> T {
        self.get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    /// Chat limits and toggles
    pub fn chat(&self) -> ChatSettings {
        ChatSettings {
            enabled: self.flag(keys::ENABLED, true),
            max_tokens: self.number(keys::MAX_TOKENS, 2000),
            temperature: self.number(keys::TEMPERATURE, 0.7),
            rate_limit: self.number(keys::RATE_LIMIT, 100),
            enable_logging: self.flag(keys::ENABLE_LOGGING, true),
            log_content: self.flag(keys::LOG_CONTENT, false),
        }
    }
}

/// Global chat settings shared by every provider
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSettings {
    pub enabled: bool,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Requests per user per hour; zero or negative disables the limit
    pub rate_limit: i64,
    pub enable_logging: bool,
    pub log_content: bool,
}
