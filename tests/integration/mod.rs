//! Integration tests for the Courier relay
//!
//! These tests drive the real router end to end: authentication, request
//! validation, rate limiting, the SSE relay against a mock provider, the
//! audit log and the admin endpoints.

mod admin;
mod auth;
mod health;
mod rate_limiting;
mod stream;
mod usage;
