//! Streaming relay
//!
//! Turns one validated chat request into the client's SSE response: resolve
//! provider credentials, build the payload, stream the provider's answer
//! through the frame parser and usage extractor, and finish the audit entry.

mod context;
mod session;

pub use context::RelayContext;
pub use session::{ChatRequest, RelayState, RelayStream, SessionRelay};
