//! Content extraction rules
//!
//! Providers carry delta text in different places. A [`ContentRule`] finds
//! it in a parsed JSON frame; the parser is instantiated with one rule per
//! side of the relay.

use serde_json::Value;

/// Finds the delta text of a JSON frame
pub type ContentRule = fn(&Value) -> Option<&str>;

/// Upstream provider shapes, first match wins:
/// `{text}` custom field, then `{choices:[{delta:{content}}]}`, then `{content}`.
pub fn provider_delta(value: &Value) -> Option<&str> {
    value
        .get("text")
        .and_then(Value::as_str)
        .or_else(|| {
            value
                .get("choices")
                .and_then(|c| c.get(0))
                .and_then(|c| c.get("delta"))
                .and_then(|d| d.get("content"))
                .and_then(Value::as_str)
        })
        .or_else(|| value.get("content").and_then(Value::as_str))
}

/// Relay output seen by clients.
///
/// The relay forwards provider frames verbatim, so clients extract with the
/// provider rule.
pub fn relay_delta(value: &Value) -> Option<&str> {
    provider_delta(value)
}
