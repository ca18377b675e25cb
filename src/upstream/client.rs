//! Provider HTTP client
//!
//! One streaming POST per relay, with a total and a connect timeout taken
//! from [`Config`]. Non-2xx answers become [`AppError::UpstreamHttp`] and
//! transport failures become [`AppError::Network`], so the relay can always
//! close the client stream with a clean terminal event.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::provider::ResolvedProvider;

use super::headers::{build_upstream_headers, ResponseKind};

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// Serialized provider request
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub endpoint: String,
    pub auth_header: String,
    pub extra_headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl UpstreamRequest {
    pub fn new(provider: &ResolvedProvider, body: &Value) -> AppResult<Self> {
        Ok(Self {
            endpoint: provider.endpoint.clone(),
            auth_header: provider.auth_header.clone(),
            extra_headers: provider.extra_headers.clone(),
            body: Bytes::from(serde_json::to_vec(body)?),
        })
    }

    /// Bytes sent upstream
    pub fn bytes_up(&self) -> u64 {
        self.body.len() as u64
    }
}

/// Streaming body of a successful provider response
///
/// Counts every byte it yields.
pub struct UpstreamStream {
    status: u16,
    inner: ByteStream,
    received: u64,
}

impl UpstreamStream {
    pub fn new(status: u16, inner: ByteStream) -> Self {
        Self {
            status,
            inner,
            received: 0,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn bytes_received(&self) -> u64 {
        self.received
    }
}

impl Stream for UpstreamStream {
    type Item = AppResult<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                self.received += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(transport_error(e)))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Client for provider chat endpoints
#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
}

impl UpstreamClient {
    /// Build a client with the configured timeouts
    pub fn new(config: &Config) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.upstream_connect_timeout_seconds))
            .timeout(Duration::from_secs(config.upstream_timeout_seconds))
            .build()?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Open a streaming chat request
    #[instrument(skip_all, fields(endpoint = %request.endpoint, bytes_up = request.body.len()))]
    pub async fn send(&self, request: &UpstreamRequest) -> AppResult<UpstreamStream> {
        let headers = build_upstream_headers(
            &request.auth_header,
            &request.extra_headers,
            ResponseKind::EventStream,
        )?;

        let response = self
            .client
            .post(&request.endpoint)
            .headers(headers)
            .body(request.body.clone())
            .send()
            .await
            .map_err(transport_error)?;

        let response = ensure_success(response).await?;
        let status = response.status().as_u16();
        debug!(status, "Upstream stream opened");

        Ok(UpstreamStream::new(status, Box::pin(response.bytes_stream())))
    }

    /// Send a request and read the whole JSON answer
    #[instrument(skip_all, fields(endpoint = %request.endpoint))]
    pub async fn send_json(&self, request: &UpstreamRequest) -> AppResult<Value> {
        let headers = build_upstream_headers(
            &request.auth_header,
            &request.extra_headers,
            ResponseKind::Json,
        )?;

        let response = self
            .client
            .post(&request.endpoint)
            .headers(headers)
            .body(request.body.clone())
            .send()
            .await
            .map_err(transport_error)?;

        read_json(ensure_success(response).await?).await
    }

    /// GET a JSON document, such as a model listing
    #[instrument(skip(self, auth_header, extra_headers))]
    pub async fn get_json(
        &self,
        url: &str,
        auth_header: &str,
        extra_headers: &[(String, String)],
    ) -> AppResult<Value> {
        let headers = build_upstream_headers(auth_header, extra_headers, ResponseKind::Json)?;

        let response = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(transport_error)?;

        read_json(ensure_success(response).await?).await
    }
}

async fn ensure_success(response: reqwest::Response) -> AppResult<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    debug!(status, "Upstream returned an error status");
    Err(AppError::UpstreamHttp { status, body })
}

async fn read_json(response: reqwest::Response) -> AppResult<Value> {
    let text = response.text().await.map_err(transport_error)?;
    Ok(serde_json::from_str(&text)?)
}

/// Classify a reqwest failure as a transport error
fn transport_error(error: reqwest::Error) -> AppError {
    let message = if error.is_timeout() {
        format!("request timed out: {}", error)
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else {
        error.to_string()
    };
    AppError::Network(message)
}
