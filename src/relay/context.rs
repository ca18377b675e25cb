//! Per-relay logging context
//!
//! Carries a short correlation id and the request's identifying fields so
//! every log line of one relay can be grepped together.

use std::time::Instant;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Context for tracking one relay through the logs
#[derive(Debug, Clone)]
pub struct RelayContext {
    /// Short id for log correlation
    pub trace_id: String,
    pub start_time: Instant,
    /// Provider handling this request, once resolved
    pub provider: String,
    pub user_id: String,
    /// Client-generated session id
    pub session_id: String,
    pub course_id: Option<i64>,
}

impl RelayContext {
    pub fn new(user_id: &str, session_id: &str) -> Self {
        Self {
            trace_id: Uuid::new_v4().simple().to_string()[..8].to_string(),
            start_time: Instant::now(),
            provider: "unresolved".to_string(),
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            course_id: None,
        }
    }

    pub fn with_course(mut self, course_id: Option<i64>) -> Self {
        self.course_id = course_id;
        self
    }

    pub fn set_provider(&mut self, provider: impl Into<String>) {
        self.provider = provider.into();
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.start_time.elapsed().as_millis()
    }

    pub fn log_request_start(&self) {
        info!(
            trace_id = %self.trace_id,
            user_id = %self.user_id,
            session_id = %self.session_id,
            course_id = ?self.course_id,
            "Relay started"
        );
    }

    pub fn log_upstream_request(&self, url: &str, body_size: u64) {
        debug!(
            trace_id = %self.trace_id,
            provider = %self.provider,
            url = %url,
            body_size,
            elapsed_ms = %self.elapsed_ms(),
            "Sending request to provider"
        );
    }

    pub fn log_stream_started(&self) {
        info!(
            trace_id = %self.trace_id,
            provider = %self.provider,
            elapsed_ms = %self.elapsed_ms(),
            "Provider stream opened"
        );
    }

    pub fn log_request_complete(&self, frames: usize, tokens: Option<u64>, approximate: bool) {
        info!(
            trace_id = %self.trace_id,
            provider = %self.provider,
            user_id = %self.user_id,
            session_id = %self.session_id,
            frames,
            tokens = ?tokens,
            approximate,
            elapsed_ms = %self.elapsed_ms(),
            "Relay completed"
        );
    }

    pub fn log_discarded_tail(&self, bytes: usize) {
        debug!(
            trace_id = %self.trace_id,
            bytes,
            "Provider closed mid-line; partial frame dropped"
        );
    }

    pub fn log_config_error(&self, error: &str) {
        warn!(
            trace_id = %self.trace_id,
            provider = %self.provider,
            error = %error,
            "Provider configuration incomplete"
        );
    }

    /// Log relay failure
    pub fn log_error(&self, error: &str) {
        error!(
            trace_id = %self.trace_id,
            provider = %self.provider,
            user_id = %self.user_id,
            session_id = %self.session_id,
            elapsed_ms = %self.elapsed_ms(),
            error = %error,
            "Relay failed"
        );
    }
}
