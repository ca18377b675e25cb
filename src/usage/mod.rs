//! Usage telemetry
//!
//! Token counts and first-token latency observed while a stream passes
//! through the relay.

pub mod extractor;

pub use extractor::{UsageExtractor, UsageSummary, USAGE_WRAPPER_KEYS};
