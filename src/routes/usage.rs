//! Caller usage report

use std::sync::Arc;

use axum::{extract::State, Extension, Json};
use tracing::instrument;

use crate::{
    audit::UsageStats,
    error::{AppResult, ErrorResponse},
    identity::CallerIdentity,
    AppState,
};

/// Reporting period of `GET /api/usage`
pub const USAGE_PERIOD_DAYS: i64 = 7;

/// The caller's usage over the last seven days
#[utoipa::path(
    get,
    path = "/api/usage",
    tag = "Usage",
    responses(
        (status = 200, description = "Aggregated usage", body = UsageStats),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip_all, fields(user_id = %identity.user_id))]
pub async fn user_usage(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<CallerIdentity>,
) -> AppResult<Json<UsageStats>> {
    let since = chrono::Utc::now().timestamp() - USAGE_PERIOD_DAYS * 24 * 60 * 60;
    let stats = state.audit.user_usage(&identity.user_id, since).await?;
    Ok(Json(stats))
}
