//! Transport abstraction and the reqwest-backed implementation.
//!
//! A [`Transport`] performs a single HTTP exchange and returns the complete
//! response, whatever its status. Status interpretation, retries and
//! deduplication happen above it, in [`Session`](crate::Session).

use crate::config::SessionConfig;
use crate::url_request::{HttpResponse, RawResponse, UrlRequest};
use crate::{NetworkError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, redirect, Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Performs HTTP exchanges.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and collect the full response body.
    async fn send(&self, request: &UrlRequest) -> Result<RawResponse>;
}

/// Shared handle to a transport.
pub type DynTransport = Arc<dyn Transport>;

/// Transport backed by a `reqwest::Client`.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a client from the session configuration.
    pub fn new(config: &SessionConfig) -> Result<Self> {
        let policy = if config.follow_redirects {
            redirect::Policy::default()
        } else {
            redirect::Policy::none()
        };

        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.as_str())
            .redirect(policy)
            .build()
            .map_err(|e| NetworkError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Underlying reqwest client.
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &UrlRequest) -> Result<RawResponse> {
        let url = request.url().to_string();

        let mut builder = self
            .client
            .request(request.method().clone(), request.url().clone())
            .headers(request.headers().clone());
        if let Some(body) = request.body() {
            builder = builder.body(body.clone());
        }
        if let Some(timeout) = request.timeout() {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| NetworkError::from_transport(&e, &url))?;

        let metadata = HttpResponse::new(
            response.url().clone(),
            response.status(),
            response.headers().clone(),
        );
        debug!(
            "{} {} -> {}",
            request.method(),
            extract_domain(&url),
            metadata.status()
        );

        let body = response
            .bytes()
            .await
            .map_err(|e| NetworkError::from_transport(&e, &url))?;

        Ok(RawResponse {
            response: metadata,
            body,
        })
    }
}

/// Check if an HTTP status code indicates a retryable error.
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429 | 500 | 502 | 503 | 504)
}

/// Delay requested by a `Retry-After` header, as seconds or an HTTP date.
pub fn retry_after(response: &HttpResponse) -> Option<Duration> {
    let value = response.header(header::RETRY_AFTER.as_str())?.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let remaining = date.with_timezone(&Utc) - Utc::now();
    Some(remaining.to_std().unwrap_or(Duration::ZERO))
}

/// Extract the host of a URL, for logging.
pub fn extract_domain(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}
