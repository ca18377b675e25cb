//! Authentication middleware
//!
//! Resolves the caller's bearer token through the configured [`AuthGate`]
//! and stores the resulting [`CallerIdentity`] in request extensions.
//!
//! [`AuthGate`]: crate::identity::AuthGate

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::{debug, instrument, warn};

use crate::{error::AppError, identity::CallerIdentity, AppState};

/// Extract the bearer token from an Authorization header value
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authentication middleware
///
/// 1. Extracts the bearer token from the Authorization header
/// 2. Resolves it to a caller through the auth gate (cached)
/// 3. Adds the [`CallerIdentity`] to request extensions
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(extract_bearer_token)
        .ok_or(AppError::Unauthorized)?;

    let identity = match state.auth_gate.authenticate(token).await {
        Ok(identity) => identity,
        Err(e) => {
            warn!(error = %e, "Session validation failed");
            return Err(e);
        }
    };

    debug!(
        user_id = %identity.user_id,
        username = %identity.username,
        is_admin = identity.is_admin,
        "Caller authenticated"
    );

    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

/// Reject callers without site administration rights
pub fn require_admin(identity: &CallerIdentity) -> Result<(), AppError> {
    if identity.is_admin {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "site administration required".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer_token("bearer abc123"), None);
        assert_eq!(extract_bearer_token("abc123"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token(""), None);
    }

    #[test]
    fn test_require_admin() {
        let mut identity = CallerIdentity {
            user_id: "2".into(),
            username: "admin".into(),
            fullname: "Admin User".into(),
            sesskey: "sk".into(),
            is_admin: true,
            courses: vec![],
        };
        assert!(require_admin(&identity).is_ok());

        identity.is_admin = false;
        assert!(matches!(
            require_admin(&identity),
            Err(AppError::Forbidden(_))
        ));
    }
}
