//! SSE output formatting for the relay's client-facing stream

use bytes::Bytes;
use serde::Serialize;

use super::parser::SseFrame;

/// Name of the terminal success event
pub const FINAL_RESPONSE_EVENT: &str = "final_response";

/// Name of in-band error events
pub const ERROR_EVENT: &str = "error";

/// In-band error payload: `{"code": ..., "message": ...}`
#[derive(Debug, Clone, Serialize)]
pub struct SseErrorPayload<'a> {
    pub code: &'a str,
    pub message: &'a str,
}

/// Re-emit an upstream frame with its original data.
///
/// A frame that arrived after an `event:` line keeps it.
pub fn format_frame(frame: &SseFrame) -> Bytes {
    match &frame.event {
        Some(event) => Bytes::from(format!("event: {}\ndata: {}\n\n", event, frame.raw)),
        None => Bytes::from(format!("data: {}\n\n", frame.raw)),
    }
}

/// Named event with a JSON body
pub fn format_event<T: Serialize>(event: &str, data: &T) -> Bytes {
    let json = serde_json::to_string(data).unwrap_or_else(|_| "{}".to_string());
    Bytes::from(format!("event: {}\ndata: {}\n\n", event, json))
}

/// `event: error` frame
pub fn format_error_event(code: &str, message: &str) -> Bytes {
    format_event(ERROR_EVENT, &SseErrorPayload { code, message })
}

/// Terminal `event: final_response` frame
pub fn format_final_response() -> Bytes {
    Bytes::from_static(b"event: final_response\ndata: {\"status\":\"completed\"}\n\n")
}
