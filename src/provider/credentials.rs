//! Credential resolution
//!
//! Turns request settings into everything the upstream client needs:
//! endpoint, `Authorization` value and static headers.

use tracing::{debug, instrument};

use crate::error::AppResult;
use crate::settings::RequestSettings;

use super::{ChatProvider, ProviderConfig, ProviderKind, TokenManager};

/// Provider ready to be called
#[derive(Debug, Clone)]
pub struct ResolvedProvider {
    pub config: ProviderConfig,
    pub endpoint: String,
    /// Empty when the provider accepts anonymous calls
    pub auth_header: String,
    pub extra_headers: Vec<(String, String)>,
}

impl ResolvedProvider {
    pub fn kind(&self) -> ProviderKind {
        self.config.kind()
    }

    pub fn provider(&self) -> &dyn ChatProvider {
        self.config.provider()
    }
}

/// Resolves provider credentials, holding the injected token cache
#[derive(Clone)]
pub struct CredentialResolver {
    tokens: TokenManager,
}

impl CredentialResolver {
    pub fn new(tokens: TokenManager) -> Self {
        Self { tokens }
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Resolve the provider selected in settings
    #[instrument(skip_all)]
    pub async fn resolve(&self, settings: &RequestSettings) -> AppResult<ResolvedProvider> {
        let config = ProviderConfig::from_settings(settings)?;
        self.resolve_config(config).await
    }

    /// Resolve a specific provider, regardless of the current selection
    pub async fn resolve_kind(
        &self,
        kind: ProviderKind,
        settings: &RequestSettings,
    ) -> AppResult<ResolvedProvider> {
        let config = ProviderConfig::load(kind, settings)?;
        self.resolve_config(config).await
    }

    async fn resolve_config(&self, config: ProviderConfig) -> AppResult<ResolvedProvider> {
        let provider = config.provider();
        let auth_header = provider.resolve_auth(&self.tokens).await?;
        let endpoint = provider.endpoint();
        let extra_headers = provider.extra_headers();

        debug!(
            provider = %provider.kind(),
            endpoint = %endpoint,
            anonymous = auth_header.is_empty(),
            "Resolved provider credentials"
        );

        Ok(ResolvedProvider {
            config,
            endpoint,
            auth_header,
            extra_headers,
        })
    }
}
