//! In-memory cache implementation
//!
//! Used in place of Redis when no `REDIS_URL` is configured (single-instance
//! deployments) and throughout the test suites.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::AppResult;

use super::WindowHit;

/// Entry in the in-memory cache with expiration
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.map(|exp| Instant::now() > exp).unwrap_or(false)
    }
}

/// In-memory cache with the same API as [`super::RedisCache`]
///
/// # Thread Safety
///
/// Key/value data sits behind an RwLock so concurrent reads never block each
/// other. Sliding-window logs use a separate mutex.
pub struct InMemoryCache {
    data: RwLock<HashMap<String, CacheEntry>>,
    windows: Mutex<HashMap<String, VecDeque<i64>>>,
    default_ttl: u64,
}

impl InMemoryCache {
    /// Create a new in-memory cache with the specified default TTL
    pub fn new(default_ttl: u64) -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            windows: Mutex::new(HashMap::new()),
            default_ttl,
        }
    }

    /// Get a value from cache
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);

        match data.get(key) {
            Some(entry) if !entry.is_expired() => {
                let parsed: T = serde_json::from_str(&entry.value)?;
                Ok(Some(parsed))
            }
            _ => Ok(None),
        }
    }

    /// Set a value in cache with default TTL
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> AppResult<()> {
        self.set_with_ttl(key, value, self.default_ttl).await
    }

    /// Set a value in cache with custom TTL (0 = no expiry)
    pub async fn set_with_ttl<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: u64,
    ) -> AppResult<()> {
        let serialized = serde_json::to_string(value)?;
        let expires_at = if ttl_seconds > 0 {
            Some(Instant::now() + Duration::from_secs(ttl_seconds))
        } else {
            None
        };

        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        data.insert(
            key.to_string(),
            CacheEntry {
                value: serialized,
                expires_at,
            },
        );
        Ok(())
    }

    /// Delete a key from cache
    pub async fn delete(&self, key: &str) -> AppResult<()> {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        data.remove(key);
        Ok(())
    }

    /// Delete every key starting with `prefix`
    pub async fn delete_prefix(&self, prefix: &str) -> AppResult<u64> {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let before = data.len();
        data.retain(|k, _| !k.starts_with(prefix));
        Ok((before - data.len()) as u64)
    }

    /// Check if a key exists (and is not expired)
    pub async fn exists(&self, key: &str) -> AppResult<bool> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        match data.get(key) {
            Some(entry) => Ok(!entry.is_expired()),
            None => Ok(false),
        }
    }

    /// Record a hit in a sliding window log.
    ///
    /// Hits older than `window_ms` are dropped first. The new hit is only kept
    /// when the window still has room for it.
    pub async fn window_hit(
        &self,
        key: &str,
        now_ms: i64,
        window_ms: i64,
        limit: u64,
    ) -> AppResult<WindowHit> {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let log = windows.entry(key.to_string()).or_default();

        while log.front().is_some_and(|&ts| ts <= now_ms - window_ms) {
            log.pop_front();
        }

        let accepted = (log.len() as u64) < limit;
        if accepted {
            log.push_back(now_ms);
        }

        Ok(WindowHit {
            count: log.len() as u64,
            accepted,
            oldest_ms: log.front().copied(),
        })
    }

    /// Clear all entries (useful for test isolation)
    #[allow(dead_code)]
    pub fn clear(&self) {
        self.data.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.windows.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}
