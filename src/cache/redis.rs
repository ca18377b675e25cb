//! Redis cache implementation
//!
//! Shared state for multi-instance deployments: OAuth tokens, resolved caller
//! identities and the per-user request windows.

use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::AppResult;

use super::WindowHit;

/// Redis cache wrapper
pub struct RedisCache {
    conn: redis::aio::ConnectionManager,
    default_ttl: u64,
}

impl RedisCache {
    /// Create a new Redis cache
    pub fn new(conn: redis::aio::ConnectionManager, default_ttl: u64) -> Self {
        Self { conn, default_ttl }
    }

    /// Get a value from cache
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;

        match value {
            Some(v) => {
                let parsed: T = serde_json::from_str(&v)?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    /// Set a value in cache with default TTL
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> AppResult<()> {
        self.set_with_ttl(key, value, self.default_ttl).await
    }

    /// Set a value in cache with custom TTL
    pub async fn set_with_ttl<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: u64,
    ) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let serialized = serde_json::to_string(value)?;
        if ttl_seconds == 0 {
            conn.set::<_, _, ()>(key, serialized).await?;
        } else {
            conn.set_ex::<_, _, ()>(key, serialized, ttl_seconds).await?;
        }
        Ok(())
    }

    /// Delete a key from cache
    pub async fn delete(&self, key: &str) -> AppResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    /// Delete every key starting with `prefix`
    pub async fn delete_prefix(&self, prefix: &str) -> AppResult<u64> {
        let mut scan_conn = self.conn.clone();
        let mut keys: Vec<String> = Vec::new();
        {
            let mut iter = scan_conn
                .scan_match::<_, String>(format!("{}*", prefix))
                .await?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }

        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.clone();
        let removed: u64 = conn.del(&keys).await?;
        Ok(removed)
    }

    /// Record a hit in a sliding window log kept as a sorted set.
    ///
    /// Trim, add and count run in one MULTI block. A hit that overflows the
    /// window is removed again so rejected requests never consume capacity.
    pub async fn window_hit(
        &self,
        key: &str,
        now_ms: i64,
        window_ms: i64,
        limit: u64,
    ) -> AppResult<WindowHit> {
        let mut conn = self.conn.clone();
        let member = format!("{}-{}", now_ms, uuid::Uuid::new_v4().simple());
        let window_secs = (window_ms / 1000).max(1);

        let (count,): (u64,) = redis::pipe()
            .atomic()
            .zrembyscore(key, "-inf", now_ms - window_ms)
            .ignore()
            .zadd(key, &member, now_ms)
            .ignore()
            .zcard(key)
            .expire(key, window_secs)
            .ignore()
            .query_async(&mut conn)
            .await?;

        let (accepted, count) = if count > limit {
            let _: i64 = conn.zrem(key, &member).await?;
            (false, count - 1)
        } else {
            (true, count)
        };

        let oldest: Vec<(String, i64)> = conn.zrange_withscores(key, 0, 0).await?;

        Ok(WindowHit {
            count,
            accepted,
            oldest_ms: oldest.first().map(|(_, score)| *score),
        })
    }

    /// Health probe
    pub async fn ping(&self) -> AppResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }
}
