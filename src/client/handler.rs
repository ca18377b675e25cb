//! Chat callbacks over a [`SseChannel`]

use std::time::Duration;

use serde_json::Value;

use crate::streaming::{SseFrame, ERROR_EVENT, FINAL_RESPONSE_EVENT};

use super::channel::{ChannelEvent, CloseReason, SseChannel};

/// Error reported to a [`ChatHandler`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatError {
    pub code: String,
    pub message: String,
    /// The channel will reconnect on its own
    pub can_retry: bool,
}

/// Receives the decoded course of one chat exchange.
///
/// Every method has an empty default.
pub trait ChatHandler: Send {
    fn on_open(&mut self) {}

    /// Displayable text of one frame
    fn on_token(&mut self, _text: &str, _frame: &SseFrame) {}

    /// `final_response` arrived
    fn on_complete(&mut self) {}

    fn on_error(&mut self, _error: &ChatError) {}

    fn on_retry(&mut self, _attempt: u32, _max_retries: u32, _delay: Duration) {}

    fn on_close(&mut self, _reason: CloseReason) {}
}

/// Route one channel event to the handler.
///
/// In-band `error` events (and frames whose data carries a `code`) are
/// relay failures, not transport ones: they are never retried.
pub fn dispatch<H: ChatHandler + ?Sized>(handler: &mut H, event: &ChannelEvent) {
    match event {
        ChannelEvent::Open => handler.on_open(),
        ChannelEvent::Message(frame) => dispatch_frame(handler, frame),
        ChannelEvent::Error {
            code,
            message,
            will_retry,
        } => handler.on_error(&ChatError {
            code: code.clone(),
            message: message.clone(),
            can_retry: *will_retry,
        }),
        ChannelEvent::Retrying {
            attempt,
            max_retries,
            delay,
        } => handler.on_retry(*attempt, *max_retries, *delay),
        ChannelEvent::Close(reason) => handler.on_close(*reason),
    }
}

fn dispatch_frame<H: ChatHandler + ?Sized>(handler: &mut H, frame: &SseFrame) {
    let code = frame.json().and_then(|v| v.get("code")).and_then(Value::as_str);
    if frame.event.as_deref() == Some(ERROR_EVENT) || code.is_some() {
        let message = frame
            .json()
            .and_then(|v| v.get("message"))
            .and_then(Value::as_str)
            .unwrap_or(&frame.raw);
        handler.on_error(&ChatError {
            code: code.unwrap_or("UNKNOWN_ERROR").to_string(),
            message: message.to_string(),
            can_retry: false,
        });
        return;
    }

    if frame.event.as_deref() == Some(FINAL_RESPONSE_EVENT) {
        handler.on_complete();
        return;
    }

    if let Some(text) = &frame.delta {
        handler.on_token(text, frame);
    }
}

/// Connect, feed every event to `handler` and return how the channel closed
pub async fn stream_chat<H: ChatHandler + ?Sized>(
    channel: &SseChannel,
    body: Value,
    handler: &mut H,
) -> CloseReason {
    let mut events = channel.connect(body);
    while let Some(event) = events.recv().await {
        dispatch(handler, &event);
        if let ChannelEvent::Close(reason) = event {
            return reason;
        }
    }
    // Worker ended without a close event
    CloseReason::Aborted
}
