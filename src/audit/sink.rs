//! Log storage
//!
//! The audit log only needs four operations from its store. Entries are
//! written once as `pending` and replaced once when the request finishes.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use redis::AsyncCommands;

use crate::error::AppResult;

use super::entry::{LogEntry, UsageStats};

/// Where audit entries live
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Store a new entry
    async fn create(&self, entry: &LogEntry) -> AppResult<()>;

    /// Replace an entry with its final state
    async fn finalize(&self, entry: &LogEntry) -> AppResult<()>;

    /// Usage of one user between `since` and now (epoch seconds)
    async fn user_usage(&self, user_id: &str, since: i64) -> AppResult<UsageStats>;

    /// Delete entries created before `cutoff`; returns how many went
    async fn purge_before(&self, cutoff: i64) -> AppResult<u64>;
}

/// Process-local sink
#[derive(Debug, Default)]
pub struct InMemoryLogSink {
    entries: RwLock<HashMap<String, LogEntry>>,
}

impl InMemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<LogEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Every stored entry, oldest first
    pub fn entries(&self) -> Vec<LogEntry> {
        let mut entries: Vec<LogEntry> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.created_at);
        entries
    }
}

#[async_trait]
impl LogSink for InMemoryLogSink {
    async fn create(&self, entry: &LogEntry) -> AppResult<()> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entry.id.clone(), entry.clone());
        Ok(())
    }

    async fn finalize(&self, entry: &LogEntry) -> AppResult<()> {
        self.create(entry).await
    }

    async fn user_usage(&self, user_id: &str, since: i64) -> AppResult<UsageStats> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(UsageStats::from_entries(
            entries.values().filter(|e| e.user_id == user_id),
            since,
            chrono::Utc::now().timestamp(),
        ))
    }

    async fn purge_before(&self, cutoff: i64) -> AppResult<u64> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, e| e.created_at >= cutoff);
        Ok((before - entries.len()) as u64)
    }
}

/// Redis keys used by [`RedisLogSink`]
pub mod keys {
    /// Sorted set of every entry id, scored by creation time
    pub const INDEX: &str = "courier:log:index";

    pub fn entry(id: &str) -> String {
        format!("courier:log:{}", id)
    }

    /// Sorted set of one user's entry ids
    pub fn user_index(user_id: &str) -> String {
        format!("courier:log:user:{}", user_id)
    }
}

/// Sink storing JSON entries in Redis with sorted-set indexes
pub struct RedisLogSink {
    conn: redis::aio::ConnectionManager,
}

impl RedisLogSink {
    pub fn new(conn: redis::aio::ConnectionManager) -> Self {
        Self { conn }
    }

    async fn load(&self, ids: &[String]) -> AppResult<Vec<LogEntry>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.conn.clone();
        let keys: Vec<String> = ids.iter().map(|id| keys::entry(id)).collect();
        let raw: Vec<Option<String>> = redis::cmd("MGET").arg(&keys).query_async(&mut conn).await?;

        Ok(raw
            .into_iter()
            .flatten()
            .filter_map(|json| serde_json::from_str(&json).ok())
            .collect())
    }
}

#[async_trait]
impl LogSink for RedisLogSink {
    async fn create(&self, entry: &LogEntry) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(entry)?;

        redis::pipe()
            .atomic()
            .set(keys::entry(&entry.id), json)
            .ignore()
            .zadd(keys::user_index(&entry.user_id), &entry.id, entry.created_at)
            .ignore()
            .zadd(keys::INDEX, &entry.id, entry.created_at)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn finalize(&self, entry: &LogEntry) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(entry)?;
        conn.set::<_, _, ()>(keys::entry(&entry.id), json).await?;
        Ok(())
    }

    async fn user_usage(&self, user_id: &str, since: i64) -> AppResult<UsageStats> {
        let mut conn = self.conn.clone();
        let now = chrono::Utc::now().timestamp();
        let ids: Vec<String> = conn
            .zrangebyscore(keys::user_index(user_id), since, now)
            .await?;

        let entries = self.load(&ids).await?;
        Ok(UsageStats::from_entries(&entries, since, now))
    }

    async fn purge_before(&self, cutoff: i64) -> AppResult<u64> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn
            .zrangebyscore(keys::INDEX, "-inf", format!("({}", cutoff))
            .await?;
        if ids.is_empty() {
            return Ok(0);
        }

        let entries = self.load(&ids).await?;
        let mut pipe = redis::pipe();
        for entry in &entries {
            pipe.zrem(keys::user_index(&entry.user_id), &entry.id).ignore();
        }
        for id in &ids {
            pipe.del(keys::entry(id)).ignore();
            pipe.zrem(keys::INDEX, id).ignore();
        }
        pipe.query_async::<_, ()>(&mut conn).await?;

        Ok(ids.len() as u64)
    }
}
