//! Outbound header construction
//!
//! Upstream requests carry only the provider's own credentials and static
//! headers. Nothing from the browser request is forwarded.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};

use crate::error::{AppError, AppResult};

/// What the caller expects back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    EventStream,
    Json,
}

/// Build headers for a provider request.
///
/// Provider extra headers are applied before the fixed ones, so they can
/// never override `Authorization`, `Content-Type` or `Accept`.
pub fn build_upstream_headers(
    auth_header: &str,
    extra_headers: &[(String, String)],
    kind: ResponseKind,
) -> AppResult<HeaderMap> {
    let mut headers = HeaderMap::new();

    for (name, value) in extra_headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| AppError::ConfigIncomplete(format!("invalid header name '{}'", name)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| AppError::ConfigIncomplete(format!("invalid value for header '{}'", name)))?;
        headers.insert(name, value);
    }

    if auth_header.is_empty() {
        headers.remove(AUTHORIZATION);
    } else {
        let mut value = HeaderValue::from_str(auth_header)
            .map_err(|_| AppError::ConfigIncomplete("invalid authorization value".to_string()))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        ACCEPT,
        match kind {
            ResponseKind::EventStream => HeaderValue::from_static("text/event-stream"),
            ResponseKind::Json => HeaderValue::from_static("application/json"),
        },
    );

    Ok(headers)
}
