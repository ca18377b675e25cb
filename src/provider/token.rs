//! OAuth2 client-credentials token cache
//!
//! Access tokens are fetched with a client_credentials exchange and kept in
//! the shared [`CacheBackend`] under an instance-scoped key. The JWT payload
//! is decoded only to learn `exp` and `sub`; the signature is not verified,
//! so those claims drive cache bookkeeping and nothing else.

use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::cache::{keys, CacheBackend};
use crate::error::{AppError, AppResult};
use crate::routes::metrics;

/// Tokens expiring within this many seconds are treated as expired
pub const EXPIRY_BUFFER_SECS: i64 = 300;

/// Lower bound for a cached token's TTL
pub const MIN_CACHE_TTL_SECS: i64 = 60;

/// Lifetime assumed when the JWT carries no `exp` claim
const DEFAULT_LIFETIME_SECS: i64 = 3600;

const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Cached OAuth access token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
    /// Epoch seconds
    pub expires_at: i64,
    /// `sub` claim, for correlation only
    pub subject: String,
    pub scope: String,
}

impl AccessToken {
    /// Whether the token outlives the expiry buffer at `now`
    pub fn is_valid_at(&self, now: i64) -> bool {
        self.expires_at > now + EXPIRY_BUFFER_SECS
    }

    /// Cache TTL: `max(60, exp - now - 300)`
    pub fn cache_ttl_at(&self, now: i64) -> u64 {
        (self.expires_at - now - EXPIRY_BUFFER_SECS).max(MIN_CACHE_TTL_SECS) as u64
    }

    /// Value for the `Authorization` header
    pub fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

/// Claims read from an access token
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JwtClaims {
    pub exp: Option<i64>,
    pub sub: Option<String>,
}

/// Decode the payload segment of a JWT without verifying it
pub fn decode_jwt_claims(jwt: &str) -> AppResult<JwtClaims> {
    let parts: Vec<&str> = jwt.split('.').collect();
    if parts.len() != 3 {
        return Err(AppError::TokenDecode(format!(
            "expected 3 segments, found {}",
            parts.len()
        )));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| AppError::TokenDecode(format!("invalid base64url payload: {}", e)))?;

    let value: serde_json::Value = serde_json::from_slice(&payload)
        .map_err(|e| AppError::TokenDecode(format!("payload is not JSON: {}", e)))?;

    let claims = value
        .as_object()
        .ok_or_else(|| AppError::TokenDecode("payload is not a JSON object".to_string()))?;

    Ok(JwtClaims {
        exp: claims
            .get("exp")
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64))),
        sub: claims
            .get("sub")
            .and_then(|v| v.as_str())
            .map(str::to_string),
    })
}

/// Client credentials for one provider instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
    /// Distinguishes token cache entries of different deployments
    pub instance: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    token_type: Option<String>,
    scope: Option<String>,
}

/// Get-or-refresh access token cache
///
/// Two requests that miss at the same time both exchange; the later write
/// wins in the cache and both tokens remain usable.
#[derive(Clone)]
pub struct TokenManager {
    http: reqwest::Client,
    cache: CacheBackend,
}

impl TokenManager {
    pub fn new(http: reqwest::Client, cache: CacheBackend) -> Self {
        Self { http, cache }
    }

    /// A token valid beyond the expiry buffer, exchanging when needed
    #[instrument(skip(self, creds), fields(instance = %creds.instance))]
    pub async fn get_access_token(&self, creds: &OAuthCredentials) -> AppResult<AccessToken> {
        let cache_key = keys::oauth_token(&creds.instance);
        let now = chrono::Utc::now().timestamp();

        match self.cache.get::<AccessToken>(&cache_key).await {
            Ok(Some(token)) if token.is_valid_at(now) => {
                debug!(expires_at = token.expires_at, "Using cached access token");
                return Ok(token);
            }
            Ok(Some(token)) => {
                debug!(expires_at = token.expires_at, "Cached access token inside expiry buffer");
            }
            Ok(None) => debug!("No cached access token"),
            Err(e) => warn!(error = %e, "Token cache read failed, exchanging"),
        }

        let token = self.exchange(creds).await?;

        let now = chrono::Utc::now().timestamp();
        if let Err(e) = self
            .cache
            .set_with_ttl(&cache_key, &token, token.cache_ttl_at(now))
            .await
        {
            warn!(error = %e, "Failed to cache access token");
        }

        Ok(token)
    }

    /// Perform a client_credentials exchange
    #[instrument(skip(self, creds), fields(token_url = %creds.token_url))]
    pub async fn exchange(&self, creds: &OAuthCredentials) -> AppResult<AccessToken> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", creds.client_id.as_str()),
            ("client_secret", creds.client_secret.as_str()),
            ("scope", creds.scope.as_str()),
        ];

        let response = self
            .http
            .post(&creds.token_url)
            .form(&form)
            .timeout(EXCHANGE_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                metrics::record_token_exchange("network_error");
                AppError::Network(format!("token endpoint unreachable: {}", e))
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.as_u16() != 200 {
            warn!(status = %status, "Token exchange rejected");
            metrics::record_token_exchange("rejected");
            return Err(AppError::UpstreamAuth(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|_| {
            metrics::record_token_exchange("invalid");
            AppError::UpstreamAuth("invalid token response".to_string())
        })?;

        let access_token = parsed.access_token.ok_or_else(|| {
            metrics::record_token_exchange("invalid");
            AppError::UpstreamAuth("token response missing access_token".to_string())
        })?;

        let claims = decode_jwt_claims(&access_token).inspect_err(|_| {
            metrics::record_token_exchange("invalid");
        })?;

        let now = chrono::Utc::now().timestamp();
        let token = AccessToken {
            access_token,
            token_type: parsed.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_at: claims.exp.unwrap_or(now + DEFAULT_LIFETIME_SECS),
            subject: claims.sub.unwrap_or_default(),
            scope: parsed.scope.unwrap_or_default(),
        };

        metrics::record_token_exchange("success");
        info!(
            expires_at = token.expires_at,
            subject = %token.subject,
            "Obtained access token"
        );

        Ok(token)
    }

    /// Forget every cached access token
    pub async fn clear(&self) -> AppResult<u64> {
        self.cache.delete_prefix(keys::OAUTH_TOKEN_PREFIX).await
    }
}
