//! Audit records

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::usage::UsageSummary;

/// Lifecycle of one relayed request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Pending,
    Completed,
    Error,
    /// The client went away before the stream finished
    Aborted,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStatus::Pending => "pending",
            LogStatus::Completed => "completed",
            LogStatus::Error => "error",
            LogStatus::Aborted => "aborted",
        }
    }
}

/// One relayed chat request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub session_id: String,
    pub user_id: String,
    pub course_id: Option<i64>,
    pub provider: String,
    pub status: LogStatus,
    pub error_message: Option<String>,
    pub bytes_up: u64,
    pub bytes_down: u64,
    pub duration_ms: Option<u64>,
    pub time_to_first_token_ms: Option<u64>,
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
    /// Reported total, or the word-count estimate when `approximate`
    pub tokens_used: Option<u64>,
    #[serde(default)]
    pub approximate: bool,
    /// Only kept when content logging is on
    pub request_content: Option<String>,
    pub response_content: Option<String>,
    /// Epoch seconds
    pub created_at: i64,
    pub completed_at: Option<i64>,
}

impl LogEntry {
    /// Fresh `pending` entry
    pub fn pending(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        course_id: Option<i64>,
        provider: impl Into<String>,
        bytes_up: u64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            user_id: user_id.into(),
            course_id,
            provider: provider.into(),
            status: LogStatus::Pending,
            error_message: None,
            bytes_up,
            bytes_down: 0,
            duration_ms: None,
            time_to_first_token_ms: None,
            prompt_tokens: None,
            completion_tokens: None,
            total_tokens: None,
            tokens_used: None,
            approximate: false,
            request_content: None,
            response_content: None,
            created_at: chrono::Utc::now().timestamp(),
            completed_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status != LogStatus::Pending
    }

    /// Copy token counts from a usage summary
    pub fn apply_usage(&mut self, usage: &UsageSummary) {
        self.prompt_tokens = usage.prompt_tokens;
        self.completion_tokens = usage.completion_tokens;
        self.total_tokens = usage.total_tokens;
        self.tokens_used = usage.total_tokens;
        self.approximate = usage.approximate;
    }
}

/// Aggregated usage of one user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UsageStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub total_bytes_up: u64,
    pub total_bytes_down: u64,
    pub total_tokens: u64,
    /// Mean duration in milliseconds
    pub avg_duration: f64,
    /// Mean time to first token in milliseconds
    pub avg_ttff: f64,
    pub period_start: i64,
    pub period_end: i64,
}

impl UsageStats {
    /// Aggregate entries created inside `[period_start, period_end]`
    pub fn from_entries<'a>(
        entries: impl IntoIterator<Item = &'a LogEntry>,
        period_start: i64,
        period_end: i64,
    ) -> Self {
        let mut stats = UsageStats {
            period_start,
            period_end,
            ..Default::default()
        };
        let (mut duration_sum, mut duration_n) = (0u64, 0u64);
        let (mut ttff_sum, mut ttff_n) = (0u64, 0u64);

        for entry in entries
            .into_iter()
            .filter(|e| e.created_at >= period_start && e.created_at <= period_end)
        {
            stats.total_requests += 1;
            match entry.status {
                LogStatus::Completed => stats.successful_requests += 1,
                LogStatus::Error | LogStatus::Aborted => stats.failed_requests += 1,
                LogStatus::Pending => {}
            }
            stats.total_bytes_up += entry.bytes_up;
            stats.total_bytes_down += entry.bytes_down;
            stats.total_tokens += entry.tokens_used.unwrap_or(0);

            if let Some(ms) = entry.duration_ms {
                duration_sum += ms;
                duration_n += 1;
            }
            if let Some(ms) = entry.time_to_first_token_ms {
                ttff_sum += ms;
                ttff_n += 1;
            }
        }

        stats.avg_duration = mean(duration_sum, duration_n);
        stats.avg_ttff = mean(ttff_sum, ttff_n);
        stats
    }
}

fn mean(sum: u64, n: u64) -> f64 {
    if n == 0 {
        0.0
    } else {
        sum as f64 / n as f64
    }
}
