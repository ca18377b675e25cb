//! Identity API client
//!
//! Resolves a browser session's bearer token into a [`CallerIdentity`].

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use tracing::{debug, error, instrument, warn};

use crate::error::{AppError, AppResult};

use super::models::{CallerIdentity, SessionResponse};

/// Identity API client
pub struct IdentityClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl IdentityClient {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Look up the session behind a bearer token
    #[instrument(skip(self, token), fields(token_len = token.len()))]
    pub async fn fetch_session(&self, token: &str) -> AppResult<CallerIdentity> {
        let url = format!("{}/api/v1/session", self.base_url);

        debug!(url = %url, "Resolving session with identity API");

        let response = self
            .client
            .get(&url)
            .headers(self.headers(token)?)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to reach identity API");
                AppError::ServiceUnavailable("Identity service unreachable".to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();

            if status.as_u16() == 401 || status.as_u16() == 404 {
                warn!(status = %status, "Session rejected by identity API");
                return Err(AppError::Unauthorized);
            }

            error!(status = %status, body = %text, "Identity API request failed");
            return Err(AppError::ServiceUnavailable(format!(
                "Identity API error {}",
                status
            )));
        }

        let body = response.text().await?;
        let result: SessionResponse = serde_json::from_str(&body).map_err(|e| {
            error!(error = %e, "Failed to parse identity API response");
            AppError::ServiceUnavailable("Invalid identity API response".to_string())
        })?;

        if !result.success {
            return Err(AppError::Unauthorized);
        }

        debug!(user_id = %result.data.user_id, "Session resolved");
        Ok(result.data)
    }

    fn headers(&self, token: &str) -> AppResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| AppError::Unauthorized)?;
        headers.insert(AUTHORIZATION, bearer);

        if let Some(key) = &self.api_key {
            let value = HeaderValue::from_str(key).map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Invalid identity API key: {}", e))
            })?;
            headers.insert("x-api-key", value);
        }
        Ok(headers)
    }
}
