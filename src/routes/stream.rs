//! Chat streaming endpoint
//!
//! `POST /api/stream` validates the request while it can still answer with
//! an HTTP status, then commits the SSE headers and hands the rest of the
//! turn to the relay.

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, Method, StatusCode},
    response::Response,
    Extension,
};
use serde::Deserialize;
use tracing::{debug, instrument};
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult, ErrorResponse},
    identity::CallerIdentity,
    provider::{ChatContext, UserInfo},
    relay::ChatRequest,
    AppState,
};

/// Body of a chat request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct StreamRequest {
    /// The user's message
    #[serde(default)]
    pub query: String,
    /// Client-generated correlation id
    #[serde(default)]
    pub session: String,
    /// Course the chat was opened from
    #[serde(default)]
    pub courseid: Option<i64>,
    /// Anti-forgery key of the caller's session
    #[serde(default)]
    pub sesskey: String,
}

fn accepts_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.contains("text/event-stream"))
}

/// Stream a chat answer as Server-Sent Events
#[utoipa::path(
    post,
    path = "/api/stream",
    tag = "Chat",
    request_body = StreamRequest,
    responses(
        (status = 200, description = "SSE stream of provider frames, ending in `final_response` or `error`", content_type = "text/event-stream", body = String),
        (status = 400, description = "Malformed request", body = ErrorResponse),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
        (status = 403, description = "Bad session key or course access", body = ErrorResponse),
        (status = 405, description = "Method not allowed", body = ErrorResponse),
        (status = 429, description = "Hourly limit reached", body = ErrorResponse),
        (status = 503, description = "Chat disabled", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip_all, fields(user_id = %identity.user_id))]
pub async fn stream_chat(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<CallerIdentity>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Response> {
    let settings = state.settings.for_request().await?;
    let chat = settings.chat();

    if !chat.enabled {
        return Err(AppError::FeatureDisabled);
    }
    if method != Method::POST {
        return Err(AppError::MethodNotAllowed);
    }
    if !accepts_event_stream(&headers) {
        return Err(AppError::BadRequest(
            "Accept header must include text/event-stream".to_string(),
        ));
    }

    let request: StreamRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {}", e)))?;
    let query = request.query.trim();
    let session = request.session.trim();
    if query.is_empty() || session.is_empty() {
        return Err(AppError::BadRequest(
            "Missing required parameters: query and session".to_string(),
        ));
    }

    if request.sesskey != identity.sesskey {
        return Err(AppError::InvalidSessionKey);
    }

    let limit = state
        .rate_limiter
        .enforce(&identity.user_id, chat.rate_limit)
        .await?;

    let course_name = match request.courseid {
        Some(course_id) => Some(
            identity
                .course(course_id)
                .map(|c| c.fullname.clone())
                .ok_or_else(|| {
                    AppError::Forbidden(format!("no access to course {}", course_id))
                })?,
        ),
        None => None,
    };

    let context = ChatContext {
        user_id: identity.user_id.clone(),
        course_id: request.courseid,
        user_info: UserInfo {
            fullname: identity.fullname.clone(),
            username: identity.username.clone(),
        },
        course_name,
        enrolled_course_ids: identity.enrolled_course_ids(),
    };

    debug!(session = %session, course_id = ?request.courseid, "Chat request accepted");

    let stream = state.relay.run(
        ChatRequest {
            session_id: session.to_string(),
            query: query.to_string(),
            context,
        },
        settings,
    );

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header("X-Accel-Buffering", "no");
    for (name, value) in limit.headers() {
        builder = builder.header(name, value);
    }

    builder
        .body(Body::from_stream(stream))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build response: {}", e)))
}
