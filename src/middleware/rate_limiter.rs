//! Per-user hourly rate limiting
//!
//! Sliding window log over the shared cache backend. Each accepted request
//! is one entry in the user's window; a request that would overflow the
//! window is rejected and leaves no trace, so retries after a rejection do
//! not push the reset further out.

use axum::http::{header, HeaderName, HeaderValue};
use tracing::{debug, warn};

use crate::cache::{keys, CacheBackend};
use crate::error::{AppError, AppResult};
use crate::routes::metrics;

/// Window length of the per-user limit
pub const WINDOW_SECONDS: u64 = 60 * 60;

/// Rate limit check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    /// Whether the request is allowed
    pub allowed: bool,
    /// Maximum requests allowed in window; zero when unlimited
    pub limit: i64,
    /// Remaining requests in current window
    pub remaining: i64,
    /// Epoch second at which the oldest request leaves the window
    pub reset_at: i64,
    /// Requests currently in the window
    pub current: i64,
}

impl RateLimitResult {
    fn unlimited() -> Self {
        Self {
            allowed: true,
            limit: 0,
            remaining: 0,
            reset_at: 0,
            current: 0,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.limit <= 0
    }

    /// Seconds until another request fits
    pub fn retry_after(&self, now: i64) -> u64 {
        (self.reset_at - now).max(1) as u64
    }

    /// `x-ratelimit-*` headers; empty when unlimited
    pub fn headers(&self) -> Vec<(HeaderName, HeaderValue)> {
        if self.is_unlimited() {
            return Vec::new();
        }

        let mut headers = vec![
            (
                HeaderName::from_static("x-ratelimit-limit"),
                HeaderValue::from(self.limit),
            ),
            (
                HeaderName::from_static("x-ratelimit-remaining"),
                HeaderValue::from(self.remaining.max(0)),
            ),
            (
                HeaderName::from_static("x-ratelimit-reset"),
                HeaderValue::from(self.reset_at),
            ),
        ];

        if !self.allowed {
            let retry_after = self.retry_after(chrono::Utc::now().timestamp());
            headers.push((header::RETRY_AFTER, HeaderValue::from(retry_after)));
        }

        headers
    }
}

/// Hourly request limiter
#[derive(Clone)]
pub struct RateLimiter {
    cache: CacheBackend,
    window_seconds: u64,
}

impl RateLimiter {
    pub fn new(cache: CacheBackend) -> Self {
        Self::with_window(cache, WINDOW_SECONDS)
    }

    pub fn with_window(cache: CacheBackend, window_seconds: u64) -> Self {
        Self {
            cache,
            window_seconds,
        }
    }

    /// Count one request against `limit`. A limit of zero or below never
    /// rejects and touches no state.
    pub async fn check(&self, user_id: &str, limit: i64) -> AppResult<RateLimitResult> {
        if limit <= 0 {
            return Ok(RateLimitResult::unlimited());
        }

        let now_ms = chrono::Utc::now().timestamp_millis();
        let window_ms = (self.window_seconds * 1000) as i64;
        let hit = self
            .cache
            .window_hit(&keys::rate_window(user_id), now_ms, window_ms, limit as u64)
            .await?;

        let oldest_ms = hit.oldest_ms.unwrap_or(now_ms);
        let reset_at = (oldest_ms + window_ms + 999) / 1000;
        let current = hit.count as i64;

        debug!(
            user_id = %user_id,
            current,
            limit,
            allowed = hit.accepted,
            "Rate limit checked"
        );

        Ok(RateLimitResult {
            allowed: hit.accepted,
            limit,
            remaining: limit - current,
            reset_at,
            current,
        })
    }

    /// Like [`RateLimiter::check`], failing with `RateLimitExceeded` when
    /// the request does not fit
    pub async fn enforce(&self, user_id: &str, limit: i64) -> AppResult<RateLimitResult> {
        let result = self.check(user_id, limit).await?;
        if result.allowed {
            return Ok(result);
        }

        metrics::record_rate_limit_rejection();
        warn!(user_id = %user_id, limit, "Rate limit exceeded");

        Err(AppError::RateLimitExceeded {
            message: format!(
                "Rate limit exceeded. Maximum {} requests per hour.",
                limit
            ),
            limit,
            used: result.current,
            retry_after: result.retry_after(chrono::Utc::now().timestamp()),
        })
    }
}
