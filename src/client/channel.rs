//! POST-initiated SSE channel
//!
//! Authentication needs a request body, so the channel issues the POST
//! itself and reads the event stream from the response. Transport failures
//! are retried with exponential backoff; a user cancellation ends the
//! channel at once with [`CloseReason::Aborted`].

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::codes;
use crate::streaming::{relay_delta, SseFrame, SseFrameParser};

const EVENT_BUFFER: usize = 64;

/// Retry and timeout settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOptions {
    pub max_retries: u32,
    /// Base backoff delay, doubled on every attempt
    pub retry_delay: Duration,
    /// Bound on one whole attempt
    pub timeout: Duration,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_delay: Duration::from_millis(1000),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Why the channel closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The stream was read to its end
    Completed,
    /// [`SseChannel::disconnect`] was called
    Aborted,
    /// Retries ran out
    Failed,
}

/// Notifications produced by a channel
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Open,
    Message(SseFrame),
    Error {
        code: String,
        message: String,
        will_retry: bool,
    },
    Retrying {
        attempt: u32,
        max_retries: u32,
        delay: Duration,
    },
    Close(CloseReason),
}

/// Snapshot of the channel's connection state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub connected: bool,
    pub retry_count: u32,
    pub max_retries: u32,
    pub last_event_id: Option<String>,
}

enum AttemptError {
    Transport(String),
    /// The event receiver was dropped
    Abandoned,
}

/// Client side of the relay's SSE stream
pub struct SseChannel {
    client: reqwest::Client,
    url: String,
    bearer: Option<String>,
    options: ChannelOptions,
    cancel: CancellationToken,
    stats: Arc<Mutex<ChannelStats>>,
}

impl SseChannel {
    pub fn new(url: impl Into<String>, options: ChannelOptions) -> Self {
        Self::with_client(reqwest::Client::new(), url, options)
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>, options: ChannelOptions) -> Self {
        let stats = ChannelStats {
            max_retries: options.max_retries,
            ..Default::default()
        };
        Self {
            client,
            url: url.into(),
            bearer: None,
            options,
            cancel: CancellationToken::new(),
            stats: Arc::new(Mutex::new(stats)),
        }
    }

    /// Session token sent as `Authorization: Bearer`
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    /// POST `body` and stream events until the channel closes.
    ///
    /// The last event is always [`ChannelEvent::Close`] unless the receiver
    /// is dropped first.
    pub fn connect(&self, body: Value) -> mpsc::Receiver<ChannelEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let worker = Worker {
            client: self.client.clone(),
            url: self.url.clone(),
            bearer: self.bearer.clone(),
            options: self.options.clone(),
            cancel: self.cancel.clone(),
            stats: Arc::clone(&self.stats),
            tx,
        };
        tokio::spawn(worker.run(body));
        rx
    }

    /// Cancel the current connection and any pending retry
    pub fn disconnect(&self) {
        self.cancel.cancel();
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        stats.connected = false;
        stats.retry_count = 0;
    }

    pub fn stats(&self) -> ChannelStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

struct Worker {
    client: reqwest::Client,
    url: String,
    bearer: Option<String>,
    options: ChannelOptions,
    cancel: CancellationToken,
    stats: Arc<Mutex<ChannelStats>>,
    tx: mpsc::Sender<ChannelEvent>,
}

impl Worker {
    async fn run(self, body: Value) {
        let mut base_delay = self.options.retry_delay;
        let mut attempt = 0u32;

        let reason = loop {
            let outcome = tokio::select! {
                () = self.cancel.cancelled() => break CloseReason::Aborted,
                outcome = self.attempt(&body, &mut base_delay) => outcome,
            };
            self.update(|s| s.connected = false);

            let message = match outcome {
                Ok(()) => break CloseReason::Completed,
                Err(AttemptError::Abandoned) => return,
                Err(AttemptError::Transport(message)) => message,
            };

            let will_retry = attempt < self.options.max_retries;
            warn!(url = %self.url, error = %message, will_retry, "SSE connection failed");
            if !self
                .emit(ChannelEvent::Error {
                    code: codes::NETWORK_ERROR.to_string(),
                    message,
                    will_retry,
                })
                .await
            {
                return;
            }
            if !will_retry {
                break CloseReason::Failed;
            }

            attempt += 1;
            self.update(|s| s.retry_count = attempt);
            let delay = base_delay * 2u32.pow(attempt - 1);
            if !self
                .emit(ChannelEvent::Retrying {
                    attempt,
                    max_retries: self.options.max_retries,
                    delay,
                })
                .await
            {
                return;
            }

            tokio::select! {
                () = self.cancel.cancelled() => break CloseReason::Aborted,
                () = tokio::time::sleep(delay) => {}
            }
        };

        debug!(url = %self.url, reason = ?reason, "SSE channel closed");
        self.emit(ChannelEvent::Close(reason)).await;
    }

    async fn attempt(&self, body: &Value, base_delay: &mut Duration) -> Result<(), AttemptError> {
        let mut request = self
            .client
            .post(&self.url)
            .header(ACCEPT, "text/event-stream")
            .json(body)
            .timeout(self.options.timeout);
        if let Some(token) = &self.bearer {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AttemptError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Transport(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            )));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.contains("text/event-stream") {
            let text = response.text().await.unwrap_or_default();
            return Err(AttemptError::Transport(format!(
                "Expected SSE response, got: {}. Response: {}",
                content_type, text
            )));
        }

        self.update(|s| s.connected = true);
        if !self.emit(ChannelEvent::Open).await {
            return Err(AttemptError::Abandoned);
        }

        let mut parser = SseFrameParser::new(relay_delta);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| AttemptError::Transport(e.to_string()))?;
            for frame in parser.feed(&chunk) {
                if !self.emit(ChannelEvent::Message(frame)).await {
                    return Err(AttemptError::Abandoned);
                }
            }

            if let Some(ms) = parser.retry_ms() {
                *base_delay = Duration::from_millis(ms);
            }
            let last_id = parser.last_event_id().map(str::to_string);
            if last_id.is_some() {
                self.update(|s| s.last_event_id = last_id);
            }
        }

        Ok(())
    }

    /// Send an event; false once the receiver is gone
    async fn emit(&self, event: ChannelEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }

    fn update(&self, f: impl FnOnce(&mut ChannelStats)) {
        f(&mut self.stats.lock().unwrap_or_else(PoisonError::into_inner));
    }
}
