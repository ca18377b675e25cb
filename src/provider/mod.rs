//! Upstream chat providers
//!
//! The set of providers is closed: [`ProviderConfig`] has one variant per
//! supported upstream and each variant implements [`ChatProvider`]. Adding a
//! provider means adding a variant.
//!
//! # Security
//!
//! Providers authenticate with their own credentials. Headers from the
//! browser request are never forwarded upstream.

mod api_key;
mod credentials;
mod custom;
mod oauth;
pub mod payload;
pub mod token;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::settings::{keys, RequestSettings};

pub use api_key::ApiKeyProvider;
pub use credentials::{CredentialResolver, ResolvedProvider};
pub use custom::{parse_header_lines, CustomEndpointProvider, COMPLETIONS_PATH};
pub use oauth::OAuthProvider;
pub use payload::{ChatContext, ChatLimits, UserInfo};
pub use token::{AccessToken, OAuthCredentials, TokenManager};

/// Provider selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    ApiKey,
    OAuthClientCredentials,
    CustomEndpoint,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::ApiKey => "api-key",
            ProviderKind::OAuthClientCredentials => "oauth-client-credentials",
            ProviderKind::CustomEndpoint => "custom-endpoint",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "api-key" | "openai" | "token" => Ok(ProviderKind::ApiKey),
            "oauth-client-credentials" | "oauth" | "custom_oauth" => {
                Ok(ProviderKind::OAuthClientCredentials)
            }
            "custom-endpoint" | "custom" | "digitalocean" => Ok(ProviderKind::CustomEndpoint),
            other => Err(AppError::ConfigIncomplete(format!(
                "unknown provider '{}'",
                other
            ))),
        }
    }
}

/// What every provider variant can do
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Chat completions URL
    fn endpoint(&self) -> String;

    /// `Authorization` header value; empty for anonymous endpoints
    async fn resolve_auth(&self, tokens: &TokenManager) -> AppResult<String>;

    /// Static headers sent with every upstream request
    fn extra_headers(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Streaming chat request body
    fn build_payload(&self, message: &str, context: &ChatContext) -> Value;

    /// Non-streaming request body used by connection tests
    fn test_payload(&self) -> Value {
        let mut payload = self.build_payload(payload::CONNECTION_TEST_MESSAGE, &ChatContext::default());
        if let Some(body) = payload.as_object_mut() {
            body.insert("stream".to_string(), Value::Bool(false));
            body.remove("stream_options");
        }
        payload
    }

    /// Model listing URL, when the provider exposes one
    fn models_url(&self) -> Option<String> {
        None
    }
}

/// Resolved configuration of the selected provider
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderConfig {
    ApiKey(ApiKeyProvider),
    OAuth(OAuthProvider),
    Custom(CustomEndpointProvider),
}

impl ProviderConfig {
    /// Provider selected by the `provider` setting (API key when unset)
    pub fn from_settings(settings: &RequestSettings) -> AppResult<Self> {
        let kind = match settings.get(keys::PROVIDER) {
            Some(name) => name.parse()?,
            None => ProviderKind::ApiKey,
        };
        Self::load(kind, settings)
    }

    /// Configuration of a specific provider
    pub fn load(kind: ProviderKind, settings: &RequestSettings) -> AppResult<Self> {
        let chat = settings.chat();
        let limits = ChatLimits {
            max_tokens: chat.max_tokens,
            temperature: chat.temperature,
        };

        match kind {
            ProviderKind::ApiKey => Ok(Self::ApiKey(ApiKeyProvider::from_settings(settings, limits)?)),
            ProviderKind::OAuthClientCredentials => {
                Ok(Self::OAuth(OAuthProvider::from_settings(settings, limits)?))
            }
            ProviderKind::CustomEndpoint => Ok(Self::Custom(CustomEndpointProvider::from_settings(
                settings, limits,
            )?)),
        }
    }

    pub fn provider(&self) -> &dyn ChatProvider {
        match self {
            ProviderConfig::ApiKey(p) => p,
            ProviderConfig::OAuth(p) => p,
            ProviderConfig::Custom(p) => p,
        }
    }

    pub fn kind(&self) -> ProviderKind {
        self.provider().kind()
    }
}
