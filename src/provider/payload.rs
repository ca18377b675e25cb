//! Chat request payloads
//!
//! Each provider variant shapes the same user message and caller context
//! differently. Building a payload never fails.

use serde::Serialize;
use serde_json::{json, Value};

/// Caller details shown to the model
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct UserInfo {
    pub fullname: String,
    pub username: String,
}

/// Context sent alongside a chat message
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatContext {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_id: Option<i64>,
    pub user_info: UserInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub enrolled_course_ids: Vec<i64>,
}

/// Generation limits applied to every provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChatLimits {
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for ChatLimits {
    fn default() -> Self {
        Self {
            max_tokens: 2000,
            temperature: 0.7,
        }
    }
}

/// Message used by connection tests
pub const CONNECTION_TEST_MESSAGE: &str = "Hello, this is a test message.";

const ASSISTANT_PREAMBLE: &str =
    "You are a helpful AI assistant integrated into a Moodle learning management system. ";
const ASSISTANT_GUIDANCE: &str =
    "Provide helpful, educational responses that are appropriate for the learning context.";

/// System prompt sent to the OAuth service, which applies its own context
pub const SERVICE_SYSTEM_PROMPT: &str = "You are a helpful AI assistant for a Moodle learning management system. \
     Provide helpful, educational responses based on the provided context.";

/// System prompt mentioning the caller's course when known
pub fn contextual_system_prompt(context: &ChatContext) -> String {
    let mut prompt = String::from(ASSISTANT_PREAMBLE);
    if let Some(course) = context.course_name.as_deref().filter(|c| !c.is_empty()) {
        prompt.push_str(&format!("The user is currently in the course: \"{}\". ", course));
    }
    prompt.push_str(ASSISTANT_GUIDANCE);
    prompt
}

/// `[system, user]` message pair
pub fn messages(system: &str, message: &str) -> Value {
    json!([
        { "role": "system", "content": system },
        { "role": "user", "content": message }
    ])
}
