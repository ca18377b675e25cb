//! Middleware module
//!
//! Caller authentication and the per-user hourly rate limit.

pub mod auth;
pub mod rate_limiter;

pub use rate_limiter::{RateLimitResult, RateLimiter};
