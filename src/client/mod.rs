//! Client for the relay's `/api/stream` endpoint
//!
//! [`SseChannel`] owns the connection and its retries; [`ChatHandler`]
//! turns channel events into chat callbacks.

mod channel;
mod handler;

pub use channel::{ChannelEvent, ChannelOptions, ChannelStats, CloseReason, SseChannel};
pub use handler::{dispatch, stream_chat, ChatError, ChatHandler};
