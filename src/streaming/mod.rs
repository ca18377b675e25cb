//! SSE (Server-Sent Events) streaming
//!
//! One parser serves both directions of the relay: it reads provider
//! streams on the server and the relay's own output in
//! [`crate::client`]. Only the content-extraction rule differs.

mod encode;
mod extract;
mod line_buffer;
mod parser;

pub use encode::{
    format_error_event, format_event, format_final_response, format_frame, SseErrorPayload,
    ERROR_EVENT, FINAL_RESPONSE_EVENT,
};
pub use extract::{provider_delta, relay_delta, ContentRule};
pub use line_buffer::SseLineBuffer;
pub use parser::{FrameData, SseFrame, SseFrameParser, DONE_SENTINEL};
