//! OpenAPI description of the Courier HTTP surface

use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

use crate::{
    audit::UsageStats,
    error::{ErrorBody, ErrorDetails, ErrorResponse},
    routes::{
        admin::{
            CacheClearResponse, ConnectionTestRequest, ConnectionTestResponse, ModelInfo,
            ModelsResponse,
        },
        health::{DependencyCheck, DependencyChecks, HealthResponse, HealthStatus},
        stream::StreamRequest,
    },
};

/// OpenAPI specification for Courier
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Courier API",
        version = "1.0.0",
        description = "Streaming relay between browser chat clients and AI chat-completion providers"
    ),
    paths(
        crate::routes::stream::stream_chat,
        crate::routes::usage::user_usage,
        crate::routes::admin::connection_test,
        crate::routes::admin::list_models,
        crate::routes::admin::clear_cache,
        crate::routes::health::health_check,
    ),
    components(
        schemas(
            StreamRequest,
            UsageStats,
            ConnectionTestRequest,
            ConnectionTestResponse,
            ModelInfo,
            ModelsResponse,
            CacheClearResponse,
            HealthStatus,
            DependencyCheck,
            DependencyChecks,
            HealthResponse,
            ErrorResponse,
            ErrorBody,
            ErrorDetails,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Chat", description = "Streaming chat relay"),
        (name = "Usage", description = "Per-user usage reports"),
        (name = "Admin", description = "Provider administration"),
        (name = "Health", description = "Service health")
    )
)]
pub struct CourierApiDoc;

/// Bearer session token issued by the host platform
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}
