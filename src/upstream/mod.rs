//! Outbound calls to chat providers

mod client;
mod headers;

pub use client::{UpstreamClient, UpstreamRequest, UpstreamStream};
pub use headers::{build_upstream_headers, ResponseKind};
