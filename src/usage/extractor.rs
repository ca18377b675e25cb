//! Usage extraction from streamed frames

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::streaming::SseFrame;

/// Vendor keys known to nest `usage` one level down
pub const USAGE_WRAPPER_KEYS: &[&str] = &["x_groq"];

/// Token usage of one relayed response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
    /// Set when counts were estimated from forwarded text rather than
    /// reported by the provider. Never bill on these.
    #[serde(default)]
    pub approximate: bool,
}

impl UsageSummary {
    /// Read a provider `usage` object
    pub fn from_usage_object(usage: &Value) -> Option<Self> {
        let usage = usage.as_object()?;
        let field = |name: &str| usage.get(name).and_then(Value::as_u64);

        let prompt_tokens = field("prompt_tokens");
        let completion_tokens = field("completion_tokens");
        let total_tokens = field("total_tokens").or(match (prompt_tokens, completion_tokens) {
            (Some(p), Some(c)) => p.checked_add(c),
            _ => None,
        });

        Some(Self {
            prompt_tokens,
            completion_tokens,
            total_tokens,
            approximate: false,
        })
    }

    /// Estimate from a word count
    pub fn approximate(words: u64) -> Self {
        Self {
            prompt_tokens: None,
            completion_tokens: Some(words),
            total_tokens: Some(words),
            approximate: true,
        }
    }
}

/// Find a usage object at the top level or under an allow-listed wrapper
fn find_usage(value: &Value) -> Option<&Value> {
    value
        .get("usage")
        .filter(|u| u.is_object())
        .or_else(|| {
            USAGE_WRAPPER_KEYS
                .iter()
                .filter_map(|key| value.get(*key)?.get("usage"))
                .find(|u| u.is_object())
        })
}

/// Watches frames for usage and first-token timing
#[derive(Debug)]
pub struct UsageExtractor {
    started: Instant,
    first_token_at: Option<Instant>,
    reported: Option<UsageSummary>,
    words: u64,
    in_word: bool,
}

impl UsageExtractor {
    pub fn new(started: Instant) -> Self {
        Self {
            started,
            first_token_at: None,
            reported: None,
            words: 0,
            in_word: false,
        }
    }

    /// Inspect one frame. Later usage objects replace earlier ones.
    pub fn observe(&mut self, frame: &SseFrame) {
        if let Some(delta) = &frame.delta {
            self.first_token_at.get_or_insert_with(Instant::now);
            self.count_words(delta);
        }

        if let Some(summary) = frame
            .json()
            .and_then(find_usage)
            .and_then(UsageSummary::from_usage_object)
        {
            self.reported = Some(summary);
        }
    }

    /// Whitespace-delimited words, counted across delta boundaries
    fn count_words(&mut self, text: &str) {
        for c in text.chars() {
            if c.is_whitespace() {
                self.in_word = false;
            } else if !self.in_word {
                self.in_word = true;
                self.words += 1;
            }
        }
    }

    pub fn time_to_first_token_ms(&self) -> Option<u64> {
        self.first_token_at
            .map(|t| t.duration_since(self.started).as_millis() as u64)
    }

    pub fn has_content(&self) -> bool {
        self.first_token_at.is_some()
    }

    pub fn reported(&self) -> Option<&UsageSummary> {
        self.reported.as_ref()
    }

    pub fn word_count(&self) -> u64 {
        self.words
    }

    /// Reported usage, or the word-count estimate
    pub fn summary(&self) -> UsageSummary {
        self.reported
            .clone()
            .unwrap_or_else(|| UsageSummary::approximate(self.words))
    }
}
