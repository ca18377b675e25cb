//! OpenAI-compatible provider authenticated with a static API key

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::settings::{keys, RequestSettings};

use super::payload::{contextual_system_prompt, messages, ChatContext, ChatLimits};
use super::{ChatProvider, ProviderKind, TokenManager};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone, PartialEq)]
pub struct ApiKeyProvider {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub organization: Option<String>,
    pub project: Option<String>,
    pub limits: ChatLimits,
}

impl ApiKeyProvider {
    pub fn from_settings(settings: &RequestSettings, limits: ChatLimits) -> AppResult<Self> {
        let api_key = settings
            .get(keys::OPENAI_API_KEY)
            .ok_or_else(|| AppError::ConfigIncomplete("OpenAI API key not configured".to_string()))?;

        Ok(Self {
            api_key: api_key.to_string(),
            api_base: settings.get_or(keys::OPENAI_API_BASE, DEFAULT_API_BASE),
            model: settings.get_or(keys::OPENAI_MODEL, DEFAULT_MODEL),
            organization: settings.get(keys::OPENAI_ORGANIZATION).map(str::to_string),
            project: settings.get(keys::OPENAI_PROJECT).map(str::to_string),
            limits,
        })
    }

    fn base(&self) -> &str {
        self.api_base.trim_end_matches('/')
    }
}

#[async_trait]
impl ChatProvider for ApiKeyProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::ApiKey
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base())
    }

    async fn resolve_auth(&self, _tokens: &TokenManager) -> AppResult<String> {
        Ok(format!("Bearer {}", self.api_key))
    }

    fn extra_headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::new();
        if let Some(org) = &self.organization {
            headers.push(("OpenAI-Organization".to_string(), org.clone()));
        }
        if let Some(project) = &self.project {
            headers.push(("OpenAI-Project".to_string(), project.clone()));
        }
        headers
    }

    fn build_payload(&self, message: &str, context: &ChatContext) -> Value {
        json!({
            "model": self.model,
            "messages": messages(&contextual_system_prompt(context), message),
            "max_tokens": self.limits.max_tokens,
            "temperature": self.limits.temperature,
            "stream": true,
            "stream_options": { "include_usage": true }
        })
    }

    fn models_url(&self) -> Option<String> {
        Some(format!("{}/models", self.base()))
    }
}
