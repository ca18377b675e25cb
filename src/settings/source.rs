//! Settings sources
//!
//! Administrators edit provider settings outside this service. A source
//! exposes them as flat string key/value pairs.

use std::collections::HashMap;
use std::env;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use redis::AsyncCommands;

use crate::error::AppResult;

/// Redis hash holding the settings
pub const SETTINGS_HASH_KEY: &str = "courier:settings";

/// Environment variable prefix for settings
pub const ENV_PREFIX: &str = "COURIER_SETTING_";

/// Read-only view of the external settings store
#[async_trait]
pub trait SettingsSource: Send + Sync {
    /// Load every setting
    async fn load_all(&self) -> AppResult<HashMap<String, String>>;

    /// Source name for logging
    fn name(&self) -> &'static str;
}

/// Settings from `COURIER_SETTING_<KEY>` environment variables
#[derive(Debug, Default)]
pub struct EnvSettings;

#[async_trait]
impl SettingsSource for EnvSettings {
    async fn load_all(&self) -> AppResult<HashMap<String, String>> {
        Ok(env::vars()
            .filter_map(|(name, value)| {
                name.strip_prefix(ENV_PREFIX)
                    .map(|key| (key.to_ascii_lowercase(), value))
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "env"
    }
}

/// Settings from a Redis hash
pub struct RedisSettings {
    conn: redis::aio::ConnectionManager,
}

impl RedisSettings {
    pub fn new(conn: redis::aio::ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl SettingsSource for RedisSettings {
    async fn load_all(&self) -> AppResult<HashMap<String, String>> {
        let mut conn = self.conn.clone();
        let values: HashMap<String, String> = conn.hgetall(SETTINGS_HASH_KEY).await?;
        Ok(values)
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

/// Mutable in-memory settings, for tests and embedding
#[derive(Debug, Default)]
pub struct InMemorySettings {
    values: RwLock<HashMap<String, String>>,
}

impl InMemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from key/value pairs
    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let settings = Self::new();
        for (k, v) in values {
            settings.set(k, v);
        }
        settings
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

#[async_trait]
impl SettingsSource for InMemorySettings {
    async fn load_all(&self) -> AppResult<HashMap<String, String>> {
        Ok(self
            .values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
