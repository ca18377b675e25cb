//! Header-authenticated custom endpoint (agent platforms, self-hosted gateways)

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::settings::{keys, RequestSettings};

use super::payload::{contextual_system_prompt, messages, ChatContext, ChatLimits};
use super::{ChatProvider, ProviderKind, TokenManager};

/// Completions path appended to the configured endpoint
pub const COMPLETIONS_PATH: &str = "/api/v1/chat/completions";

#[derive(Debug, Clone, PartialEq)]
pub struct CustomEndpointProvider {
    /// Endpoint as configured
    pub base_endpoint: String,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub headers: Vec<(String, String)>,
    pub limits: ChatLimits,
}

impl CustomEndpointProvider {
    pub fn from_settings(settings: &RequestSettings, limits: ChatLimits) -> AppResult<Self> {
        let endpoint = settings
            .get(keys::CUSTOM_ENDPOINT)
            .ok_or_else(|| AppError::ConfigIncomplete("Custom endpoint not configured".to_string()))?;

        Ok(Self {
            base_endpoint: endpoint.to_string(),
            api_key: settings.get(keys::CUSTOM_API_KEY).map(str::to_string),
            model: settings.get(keys::CUSTOM_MODEL).map(str::to_string),
            headers: settings
                .get(keys::CUSTOM_HEADERS)
                .map(parse_header_lines)
                .unwrap_or_default(),
            limits,
        })
    }
}

/// Normalize an endpoint so it ends in the completions path.
///
/// An endpoint already ending in `/chat/completions` is kept; one ending in
/// `/api/v1` only gains `/chat/completions`.
fn completions_url(endpoint: &str) -> String {
    let base = endpoint.trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else if let Some(root) = base.strip_suffix("/api/v1") {
        format!("{}{}", root, COMPLETIONS_PATH)
    } else {
        format!("{}{}", base, COMPLETIONS_PATH)
    }
}

/// Parse `Name: Value` lines; malformed lines are skipped
pub fn parse_header_lines(raw: &str) -> Vec<(String, String)> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match line.split_once(':') {
            Some((name, value)) if !name.trim().is_empty() => {
                Some((name.trim().to_string(), value.trim().to_string()))
            }
            _ => {
                warn!(line = %line, "Ignoring malformed custom header line");
                None
            }
        })
        .collect()
}

#[async_trait]
impl ChatProvider for CustomEndpointProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::CustomEndpoint
    }

    fn endpoint(&self) -> String {
        completions_url(&self.base_endpoint)
    }

    async fn resolve_auth(&self, _tokens: &TokenManager) -> AppResult<String> {
        Ok(self
            .api_key
            .as_ref()
            .map(|key| format!("Bearer {}", key))
            .unwrap_or_default())
    }

    fn extra_headers(&self) -> Vec<(String, String)> {
        self.headers.clone()
    }

    fn build_payload(&self, message: &str, context: &ChatContext) -> Value {
        let mut payload = json!({
            "messages": messages(&contextual_system_prompt(context), message),
            "max_tokens": self.limits.max_tokens,
            "temperature": self.limits.temperature,
            "stream": true,
        });
        if let (Some(model), Some(body)) = (&self.model, payload.as_object_mut()) {
            body.insert("model".to_string(), Value::String(model.clone()));
        }
        payload
    }

    fn models_url(&self) -> Option<String> {
        let url = self.endpoint();
        let root = url.strip_suffix("/chat/completions").unwrap_or(&url);
        Some(format!("{}/models", root))
    }
}
