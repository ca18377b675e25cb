//! HTTP routes for Courier
//!
//! This module defines all HTTP endpoints exposed by the relay.

pub mod admin;
pub mod health;
pub mod metrics;
pub mod stream;
pub mod usage;

use std::sync::Arc;

use axum::{
    http::HeaderValue,
    middleware,
    routing::{any, get, post},
    Json, Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;
use utoipa::OpenApi;

use crate::{docs::CourierApiDoc, middleware::auth::auth_middleware, AppState};

fn cors_layer(allowed_origin: Option<&str>) -> CorsLayer {
    let origin = match allowed_origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => AllowOrigin::exact(origin),
        Some(Err(_)) => {
            warn!("CORS_ALLOWED_ORIGIN is not a valid header value; allowing any origin");
            AllowOrigin::any()
        }
        None => AllowOrigin::any(),
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(CourierApiDoc::openapi())
}

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    // Every method reaches the stream handler so a disabled feature is
    // reported before a wrong method.
    let protected_routes = Router::new()
        .route("/api/stream", any(stream::stream_chat))
        .route("/api/usage", get(usage::user_usage))
        .route("/api/admin/connection-test", post(admin::connection_test))
        .route("/api/admin/models", get(admin::list_models))
        .route("/api/admin/cache/clear", post(admin::clear_cache))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Public routes (health checks, metrics, API description) - no auth required
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/live", get(health::liveness_check))
        .route("/metrics", get(metrics::prometheus_metrics))
        .route("/docs/openapi.json", get(openapi_json));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        // SSE responses are excluded by the default compression predicate
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(state.config.cors_allowed_origin.as_deref()))
        .with_state(state)
}
