//! Error types for Courier
//!
//! Every failure is an [`AppError`]. Before the SSE headers are committed an
//! error renders as a JSON body with an HTTP status; afterwards the relay
//! emits it in-band using [`AppError::sse_code`] and [`AppError::sse_message`].

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// In-band error codes carried by `event: error` frames
pub mod codes {
    pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
    pub const UPSTREAM_ERROR: &str = "UPSTREAM_ERROR";
    pub const SYSTEM_ERROR: &str = "SYSTEM_ERROR";
    pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
}

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid session key")]
    InvalidSessionKey,

    #[error("Access forbidden: {0}")]
    Forbidden(String),

    #[error("Rate limit exceeded: {message}")]
    RateLimitExceeded {
        message: String,
        limit: i64,
        used: i64,
        retry_after: u64,
    },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("AI chat is disabled")]
    FeatureDisabled,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("API service not configured: {0}")]
    ConfigIncomplete(String),

    #[error("Token exchange failed: {0}")]
    UpstreamAuth(String),

    #[error("Unable to decode access token: {0}")]
    TokenDecode(String),

    #[error("HTTP {status}: {body}")]
    UpstreamHttp { status: u16, body: String },

    #[error("{0}")]
    Network(String),

    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Code used when this error has to be reported inside an SSE stream
    pub fn sse_code(&self) -> &'static str {
        match self {
            AppError::ConfigIncomplete(_) | AppError::UpstreamAuth(_) | AppError::TokenDecode(_) => {
                codes::CONFIG_ERROR
            }
            AppError::UpstreamHttp { .. } | AppError::Network(_) | AppError::HttpError(_) => {
                codes::UPSTREAM_ERROR
            }
            _ => codes::SYSTEM_ERROR,
        }
    }

    /// Message shown to the user alongside [`AppError::sse_code`]
    pub fn sse_message(&self) -> String {
        match self.sse_code() {
            codes::CONFIG_ERROR => self.to_string(),
            codes::UPSTREAM_ERROR => format!("AI service error: {}", self),
            _ => "System error occurred".to_string(),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error details
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
}

/// Additional error details for rate limiting
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                self.to_string(),
                None,
            ),
            AppError::InvalidSessionKey => (
                StatusCode::FORBIDDEN,
                "INVALID_SESSKEY",
                self.to_string(),
                None,
            ),
            AppError::Forbidden(_) => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                self.to_string(),
                None,
            ),
            AppError::RateLimitExceeded {
                message,
                limit,
                used,
                retry_after,
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMIT_EXCEEDED",
                message.clone(),
                Some(ErrorDetails {
                    limit: Some(*limit),
                    used: Some(*used),
                    retry_after: Some(*retry_after),
                }),
            ),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                msg.clone(),
                None,
            ),
            AppError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                "METHOD_NOT_ALLOWED",
                self.to_string(),
                None,
            ),
            AppError::FeatureDisabled => (
                StatusCode::SERVICE_UNAVAILABLE,
                "FEATURE_DISABLED",
                self.to_string(),
                None,
            ),
            AppError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                msg.clone(),
                None,
            ),
            AppError::ConfigIncomplete(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                codes::CONFIG_ERROR,
                self.to_string(),
                None,
            ),
            AppError::UpstreamAuth(_) | AppError::TokenDecode(_) => (
                StatusCode::BAD_GATEWAY,
                codes::CONFIG_ERROR,
                self.to_string(),
                None,
            ),
            AppError::UpstreamHttp { .. } | AppError::Network(_) => (
                StatusCode::BAD_GATEWAY,
                codes::UPSTREAM_ERROR,
                self.sse_message(),
                None,
            ),
            AppError::RedisError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CACHE_ERROR",
                "Cache service error".to_string(),
                None,
            ),
            AppError::HttpError(_) => (
                StatusCode::BAD_GATEWAY,
                codes::UPSTREAM_ERROR,
                "Upstream service error".to_string(),
                None,
            ),
            AppError::JsonError(_) => (
                StatusCode::BAD_REQUEST,
                "INVALID_JSON",
                "Invalid JSON in request".to_string(),
                None,
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
                None,
            ),
        };

        let rate_limit = match &self {
            AppError::RateLimitExceeded {
                limit, retry_after, ..
            } => Some((*limit, *retry_after)),
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let Some((limit, retry_after)) = rate_limit {
            let headers = response.headers_mut();
            headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
            headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
            headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        }
        response
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
