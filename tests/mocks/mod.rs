//! Mock infrastructure for external services
//!
//! - Chat-completions provider (streaming, JSON, models, OAuth token endpoint)
//! - Identity API (session lookup for the HTTP auth gate)

#![allow(dead_code)]

pub mod identity;
pub mod provider;

pub use identity::*;
pub use provider::*;
