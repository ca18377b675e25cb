//! Service authenticated through OAuth2 client credentials

use async_trait::async_trait;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::error::{AppError, AppResult};
use crate::settings::{keys, RequestSettings};

use super::payload::{messages, ChatContext, ChatLimits, SERVICE_SYSTEM_PROMPT};
use super::{ChatProvider, OAuthCredentials, ProviderKind, TokenManager};

pub const DEFAULT_SCOPE: &str = "api:read api:write";

#[derive(Debug, Clone, PartialEq)]
pub struct OAuthProvider {
    pub credentials: OAuthCredentials,
    pub base_url: String,
    pub app_id: Option<String>,
    pub limits: ChatLimits,
}

impl OAuthProvider {
    pub fn from_settings(settings: &RequestSettings, limits: ChatLimits) -> AppResult<Self> {
        let required = |key: &str| {
            settings
                .get(key)
                .map(str::to_string)
                .ok_or_else(|| AppError::ConfigIncomplete(format!("OAuth setting '{}' is missing", key)))
        };

        let token_url = required(keys::TOKEN_URL)?;
        let client_id = required(keys::CLIENT_ID)?;
        let client_secret = required(keys::CLIENT_SECRET)?;
        let base_url = required(keys::BASE_URL)?;

        let instance = settings
            .get(keys::OAUTH_INSTANCE)
            .map(str::to_string)
            .unwrap_or_else(|| instance_key(&token_url, &client_id));

        Ok(Self {
            credentials: OAuthCredentials {
                token_url,
                client_id,
                client_secret,
                scope: settings.get_or(keys::OAUTH_SCOPE, DEFAULT_SCOPE),
                instance,
            },
            base_url,
            app_id: settings.get(keys::APP_ID).map(str::to_string),
            limits,
        })
    }
}

/// Cache scope derived from the credentials, so a reconfigured client never
/// picks up a token issued to the previous one
fn instance_key(token_url: &str, client_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token_url.as_bytes());
    hasher.update(b"|");
    hasher.update(client_id.as_bytes());
    hex::encode(&hasher.finalize()[..8])
}

#[async_trait]
impl ChatProvider for OAuthProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OAuthClientCredentials
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    async fn resolve_auth(&self, tokens: &TokenManager) -> AppResult<String> {
        let token = tokens.get_access_token(&self.credentials).await?;
        Ok(token.authorization())
    }

    fn build_payload(&self, message: &str, context: &ChatContext) -> Value {
        json!({
            "messages": messages(SERVICE_SYSTEM_PROMPT, message),
            "max_tokens": self.limits.max_tokens,
            "temperature": self.limits.temperature,
            "stream": true,
            "context": context,
            "app_id": self.app_id,
        })
    }
}
