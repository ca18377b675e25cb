//! Administration endpoints
//!
//! Connection testing, model discovery and cache purging. Every handler
//! requires a site administrator.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::{AppError, AppResult, ErrorResponse},
    identity::CallerIdentity,
    middleware::auth::require_admin,
    provider::{ProviderKind, ResolvedProvider},
    upstream::UpstreamRequest,
    AppState,
};

/// Model id prefixes listed for the API-key provider
const CHAT_MODEL_PREFIXES: &[&str] = &["gpt-", "o1-", "chatgpt-"];

/// Models offered when a custom endpoint cannot list its own
const DEFAULT_CUSTOM_MODELS: &[(&str, &str)] = &[
    (
        "meta-llama/Llama-3.2-90B-Vision-Instruct",
        "Llama 3.2 90B Vision Instruct",
    ),
    (
        "meta-llama/Llama-3.2-11B-Vision-Instruct",
        "Llama 3.2 11B Vision Instruct",
    ),
    ("meta-llama/Llama-3.1-70B-Instruct", "Llama 3.1 70B Instruct"),
    ("meta-llama/Llama-3.1-8B-Instruct", "Llama 3.1 8B Instruct"),
    ("meta-llama/Meta-Llama-3-70B-Instruct", "Llama 3 70B Instruct"),
    ("meta-llama/Meta-Llama-3-8B-Instruct", "Llama 3 8B Instruct"),
];

/// Optional provider override for a connection test
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ConnectionTestRequest {
    /// Provider to test instead of the selected one
    #[serde(default)]
    pub provider: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConnectionTestResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Provider that was tested
    pub mode: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ModelsQuery {
    /// `api-key` or `custom-endpoint`
    pub provider: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ModelsResponse {
    pub success: bool,
    pub models: Vec<ModelInfo>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CacheClearResponse {
    pub success: bool,
    /// OAuth tokens removed from the shared cache
    pub tokens_cleared: u64,
}

/// Send the provider's test payload and report the outcome
#[utoipa::path(
    post,
    path = "/api/admin/connection-test",
    tag = "Admin",
    request_body(content = ConnectionTestRequest, description = "Optional provider override"),
    responses(
        (status = 200, description = "Test outcome", body = ConnectionTestResponse),
        (status = 403, description = "Not an administrator", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip_all)]
pub async fn connection_test(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<CallerIdentity>,
    body: Option<Json<ConnectionTestRequest>>,
) -> AppResult<Json<ConnectionTestResponse>> {
    require_admin(&identity)?;

    let settings = state.settings.for_request().await?;
    let requested = body.and_then(|Json(b)| b.provider);
    let resolved = match requested {
        Some(name) => {
            let kind: ProviderKind = name
                .parse()
                .map_err(|_| AppError::BadRequest(format!("Invalid provider '{}'", name)))?;
            state.resolver.resolve_kind(kind, &settings).await
        }
        None => state.resolver.resolve(&settings).await,
    };

    let (mode, outcome) = match resolved {
        Ok(provider) => {
            let mode = provider.kind().to_string();
            (mode, send_test_request(&state, &provider).await)
        }
        Err(e) => {
            let mode = settings
                .get(crate::settings::keys::PROVIDER)
                .unwrap_or(ProviderKind::ApiKey.as_str())
                .to_string();
            (mode, Err(e))
        }
    };

    let response = match outcome {
        Ok(()) => {
            info!(mode = %mode, "Connection test succeeded");
            ConnectionTestResponse {
                success: true,
                message: Some("API connection successful".to_string()),
                error: None,
                mode,
            }
        }
        Err(e) => {
            warn!(mode = %mode, error = %e, "Connection test failed");
            ConnectionTestResponse {
                success: false,
                message: None,
                error: Some(e.to_string()),
                mode,
            }
        }
    };

    Ok(Json(response))
}

async fn send_test_request(state: &AppState, provider: &ResolvedProvider) -> AppResult<()> {
    let request = UpstreamRequest::new(provider, &provider.provider().test_payload())?;
    state.upstream.send_json(&request).await?;
    Ok(())
}

/// List the chat models a provider offers
#[utoipa::path(
    get,
    path = "/api/admin/models",
    tag = "Admin",
    params(ModelsQuery),
    responses(
        (status = 200, description = "Available models", body = ModelsResponse),
        (status = 400, description = "Provider cannot list models", body = ErrorResponse),
        (status = 403, description = "Not an administrator", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip_all, fields(provider = %query.provider))]
pub async fn list_models(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<CallerIdentity>,
    Query(query): Query<ModelsQuery>,
) -> AppResult<Json<ModelsResponse>> {
    require_admin(&identity)?;

    let kind: ProviderKind = query
        .provider
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid provider".to_string()))?;
    if kind == ProviderKind::OAuthClientCredentials {
        return Err(AppError::BadRequest("Invalid provider".to_string()));
    }

    let settings = state.settings.for_request().await?;
    let provider = state.resolver.resolve_kind(kind, &settings).await?;
    let url = provider
        .provider()
        .models_url()
        .ok_or_else(|| AppError::BadRequest("Provider does not list models".to_string()))?;

    let listing = state
        .upstream
        .get_json(&url, &provider.auth_header, &provider.extra_headers)
        .await;

    let models = match kind {
        ProviderKind::ApiKey => chat_models(&listing?)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Invalid response from models API")))?,
        _ => match listing.ok().as_ref().and_then(listed_models) {
            Some(models) => models,
            None => {
                warn!("Custom endpoint did not list models; using defaults");
                default_custom_models()
            }
        },
    };

    Ok(Json(ModelsResponse {
        success: true,
        models,
    }))
}

/// Purge the settings snapshot and the OAuth token cache
#[utoipa::path(
    post,
    path = "/api/admin/cache/clear",
    tag = "Admin",
    responses(
        (status = 200, description = "Caches purged", body = CacheClearResponse),
        (status = 403, description = "Not an administrator", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip_all)]
pub async fn clear_cache(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<CallerIdentity>,
) -> AppResult<Json<CacheClearResponse>> {
    require_admin(&identity)?;

    state.settings.purge();
    let tokens_cleared = state.resolver.tokens().clear().await?;
    info!(tokens_cleared, "Caches cleared");

    Ok(Json(CacheClearResponse {
        success: true,
        tokens_cleared,
    }))
}

fn model_entries(listing: &Value) -> Option<impl Iterator<Item = ModelInfo> + '_> {
    let data = listing.get("data")?.as_array()?;
    Some(data.iter().filter_map(|model| {
        let id = model.get("id")?.as_str()?;
        Some(ModelInfo {
            id: id.to_string(),
            name: id.to_string(),
            created: model.get("created").and_then(Value::as_i64),
        })
    }))
}

/// Chat-capable models from an OpenAI listing, newest naming first
fn chat_models(listing: &Value) -> Option<Vec<ModelInfo>> {
    let mut models: Vec<ModelInfo> = model_entries(listing)?
        .filter(|m| {
            CHAT_MODEL_PREFIXES.iter().any(|p| m.id.starts_with(p)) && !m.id.contains("instruct")
        })
        .collect();
    models.sort_by(|a, b| b.id.cmp(&a.id));
    Some(models)
}

fn listed_models(listing: &Value) -> Option<Vec<ModelInfo>> {
    Some(model_entries(listing)?.collect())
}

fn default_custom_models() -> Vec<ModelInfo> {
    DEFAULT_CUSTOM_MODELS
        .iter()
        .map(|(id, name)| ModelInfo {
            id: id.to_string(),
            name: name.to_string(),
            created: None,
        })
        .collect()
}
