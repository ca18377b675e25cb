//! Incremental SSE frame parser
//!
//! Side-effect free: bytes in, [`SseFrame`]s out. Upstream provider streams
//! and the relay's own output are parsed by the same code, each with its
//! own [`ContentRule`].

use serde_json::Value;
use tracing::debug;

use super::extract::ContentRule;
use super::line_buffer::SseLineBuffer;

/// OpenAI end-of-stream sentinel
pub const DONE_SENTINEL: &str = "[DONE]";

/// Payload of a `data:` line
#[derive(Debug, Clone, PartialEq)]
pub enum FrameData {
    Json(Value),
    /// Not valid JSON; kept as-is
    Text(String),
}

/// One SSE frame (a single `data:` line plus the fields preceding it)
#[derive(Debug, Clone, PartialEq)]
pub struct SseFrame {
    /// `event:` name attached to this data line
    pub event: Option<String>,
    pub data: FrameData,
    /// Data exactly as received
    pub raw: String,
    /// Last `id:` seen so far
    pub id: Option<String>,
    /// Last numeric `retry:` seen so far
    pub retry_ms: Option<u64>,
    /// Displayable delta text; `None` marks a control frame
    pub delta: Option<String>,
}

impl SseFrame {
    pub fn json(&self) -> Option<&Value> {
        match &self.data {
            FrameData::Json(v) => Some(v),
            FrameData::Text(_) => None,
        }
    }

    pub fn is_control(&self) -> bool {
        self.delta.is_none()
    }
}

/// Stateful line-oriented frame parser
#[derive(Debug)]
pub struct SseFrameParser {
    lines: SseLineBuffer,
    rule: ContentRule,
    pending_event: Option<String>,
    last_id: Option<String>,
    retry_ms: Option<u64>,
}

impl SseFrameParser {
    pub fn new(rule: ContentRule) -> Self {
        Self {
            lines: SseLineBuffer::new(),
            rule,
            pending_event: None,
            last_id: None,
            retry_ms: None,
        }
    }

    /// Consume one chunk and return the frames it completed
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.lines
            .feed(chunk)
            .into_iter()
            .filter_map(|line| self.parse_line(&line))
            .collect()
    }

    /// Bytes of an unterminated trailing line.
    ///
    /// They are never turned into a frame; a stream that ends mid-line simply
    /// ends.
    pub fn discarded_tail(&self) -> String {
        self.lines.remaining()
    }

    pub fn last_event_id(&self) -> Option<&str> {
        self.last_id.as_deref()
    }

    pub fn retry_ms(&self) -> Option<u64> {
        self.retry_ms
    }

    fn parse_line(&mut self, line: &str) -> Option<SseFrame> {
        if let Some(data) = field(line, "data") {
            let event = self.pending_event.take();
            if data == DONE_SENTINEL {
                return None;
            }
            return Some(self.frame(event, data));
        }

        if let Some(event) = field(line, "event") {
            self.pending_event = Some(event.to_string());
        } else if let Some(id) = field(line, "id") {
            self.last_id = Some(id.to_string());
        } else if let Some(retry) = field(line, "retry") {
            match retry.parse() {
                Ok(ms) => self.retry_ms = Some(ms),
                Err(_) => debug!(value = %retry, "Ignoring non-numeric retry field"),
            }
        }
        None
    }

    fn frame(&self, event: Option<String>, raw: &str) -> SseFrame {
        let data = match serde_json::from_str::<Value>(raw) {
            Ok(value) => FrameData::Json(value),
            Err(e) => {
                debug!(error = %e, "Frame data is not JSON, keeping text");
                FrameData::Text(raw.to_string())
            }
        };

        let delta = match &data {
            FrameData::Json(value) => (self.rule)(value)
                .filter(|text| !text.is_empty())
                .map(str::to_string),
            FrameData::Text(_) => None,
        };

        SseFrame {
            event,
            data,
            raw: raw.to_string(),
            id: self.last_id.clone(),
            retry_ms: self.retry_ms,
            delta,
        }
    }
}

/// Value of `name:` with one optional leading space removed
fn field<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(name)?.strip_prefix(':')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}
