//! Audit log of relayed requests
//!
//! A [`PendingLog`] is opened before the provider is called and finished
//! exactly once. Dropping it unfinished (the client went away and the relay
//! stream was dropped) records the entry as `aborted`, so no entry stays
//! `pending` forever. The final write runs on its own task, so dropping the
//! relay while it is in flight does not lose it either.

pub mod entry;
pub mod sink;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::settings::ChatSettings;
use crate::usage::UsageSummary;

pub use entry::{LogEntry, LogStatus, UsageStats};
pub use sink::{InMemoryLogSink, LogSink, RedisLogSink};

/// Message stored when the client disconnects mid-stream
pub const CLIENT_DISCONNECTED: &str = "client disconnected";

const PURGE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Which parts of a request get recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogPolicy {
    pub enabled: bool,
    pub log_content: bool,
}

impl From<&ChatSettings> for LogPolicy {
    fn from(settings: &ChatSettings) -> Self {
        Self {
            enabled: settings.enable_logging,
            log_content: settings.log_content,
        }
    }
}

/// Request details known before the provider is called
#[derive(Debug, Clone)]
pub struct LogDraft {
    pub session_id: String,
    pub user_id: String,
    pub course_id: Option<i64>,
    pub provider: String,
    pub bytes_up: u64,
    pub query: String,
    /// Request start; durations are measured from here
    pub started: Instant,
}

/// Audit log front end
#[derive(Clone)]
pub struct AuditLog {
    sink: Arc<dyn LogSink>,
}

impl AuditLog {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &Arc<dyn LogSink> {
        &self.sink
    }

    /// Open a `pending` entry.
    ///
    /// Storage failures are logged and the request continues unaudited.
    pub async fn open(&self, draft: LogDraft, policy: LogPolicy) -> PendingLog {
        if !policy.enabled {
            return PendingLog::disabled();
        }

        let mut entry = LogEntry::pending(
            draft.session_id,
            draft.user_id,
            draft.course_id,
            draft.provider,
            draft.bytes_up,
        );
        if policy.log_content {
            entry.request_content = Some(draft.query);
        }

        if let Err(e) = self.sink.create(&entry).await {
            warn!(error = %e, "Failed to create audit entry");
            return PendingLog::disabled();
        }

        debug!(log_id = %entry.id, "Audit entry opened");
        PendingLog {
            entry: Some(entry),
            sink: Some(Arc::clone(&self.sink)),
            log_content: policy.log_content,
            started: draft.started,
        }
    }

    pub async fn user_usage(&self, user_id: &str, since: i64) -> crate::error::AppResult<UsageStats> {
        self.sink.user_usage(user_id, since).await
    }

    /// Delete entries older than `retention_days`
    pub async fn purge(&self, retention_days: u64) -> crate::error::AppResult<u64> {
        let cutoff = chrono::Utc::now().timestamp() - (retention_days as i64) * 24 * 60 * 60;
        self.sink.purge_before(cutoff).await
    }
}

/// Final measurements of a request
#[derive(Debug, Clone, Default)]
pub struct LogOutcome {
    pub usage: Option<UsageSummary>,
    pub response_content: Option<String>,
}

/// An open audit entry, finished exactly once
pub struct PendingLog {
    entry: Option<LogEntry>,
    sink: Option<Arc<dyn LogSink>>,
    log_content: bool,
    started: Instant,
}

impl PendingLog {
    fn disabled() -> Self {
        Self {
            entry: None,
            sink: None,
            log_content: false,
            started: Instant::now(),
        }
    }

    /// Entry id, when logging is active
    pub fn id(&self) -> Option<&str> {
        self.entry.as_ref().map(|e| e.id.as_str())
    }

    /// Record progress so an abort still carries partial metrics
    pub fn track(&mut self, bytes_down: u64, time_to_first_token_ms: Option<u64>) {
        if let Some(entry) = self.entry.as_mut() {
            entry.bytes_down = bytes_down;
            if entry.time_to_first_token_ms.is_none() {
                entry.time_to_first_token_ms = time_to_first_token_ms;
            }
        }
    }

    pub async fn complete(self, outcome: LogOutcome) {
        self.finish(LogStatus::Completed, None, outcome).await
    }

    pub async fn fail(self, message: impl Into<String>, outcome: LogOutcome) {
        self.finish(LogStatus::Error, Some(message.into()), outcome)
            .await
    }

    async fn finish(mut self, status: LogStatus, error: Option<String>, outcome: LogOutcome) {
        let (Some(mut entry), Some(sink)) = (self.entry.take(), self.sink.take()) else {
            return;
        };

        close_entry(&mut entry, status, error, self.started);
        if let Some(usage) = &outcome.usage {
            entry.apply_usage(usage);
        }
        if self.log_content {
            entry.response_content = outcome.response_content;
        }

        let write = tokio::spawn(async move {
            if let Err(e) = sink.finalize(&entry).await {
                warn!(log_id = %entry.id, error = %e, "Failed to finalize audit entry");
            }
        });
        if let Err(e) = write.await {
            warn!(error = %e, "Audit finalize task failed");
        }
    }
}

impl Drop for PendingLog {
    fn drop(&mut self) {
        let (Some(mut entry), Some(sink)) = (self.entry.take(), self.sink.take()) else {
            return;
        };

        close_entry(
            &mut entry,
            LogStatus::Aborted,
            Some(CLIENT_DISCONNECTED.to_string()),
            self.started,
        );

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = sink.finalize(&entry).await {
                        warn!(log_id = %entry.id, error = %e, "Failed to record aborted request");
                    }
                });
            }
            Err(_) => warn!(log_id = %entry.id, "No runtime to record aborted request"),
        }
    }
}

fn close_entry(entry: &mut LogEntry, status: LogStatus, error: Option<String>, started: Instant) {
    entry.status = status;
    entry.error_message = error;
    entry.duration_ms = Some(started.elapsed().as_millis() as u64);
    entry.completed_at = Some(chrono::Utc::now().timestamp());
}

/// Purge old entries now and then once a day
pub fn spawn_purge_task(audit: AuditLog, retention_days: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match audit.purge(retention_days).await {
                Ok(0) => debug!("No audit entries to purge"),
                Ok(removed) => info!(removed, retention_days, "Purged old audit entries"),
                Err(e) => warn!(error = %e, "Audit purge failed"),
            }
        }
    })
}
