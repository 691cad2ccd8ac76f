//! Network transport.
//!
//! ### Contract
//! - One request in, one full response out; no retries, no caching.
//! - Non-2xx statuses are responses, not errors.
//! - Connectivity failures (DNS, refused, TLS, timeout) come back as
//!   [`TransportError`] so the router can fall back instead of propagating.
//!
//! ### Limits
//! - Max redirects: 5
//! - Request timeout: 20s (configurable); the only timeout in the system
//! - No body size cap: a reachable origin's response is passed on whole.
//!   Install applies its own per-resource limit.

pub mod url;

use async_trait::async_trait;
use reqwest::Client;
use shellcache_core::{AppConfig, Error};
use std::time::{Duration, Instant};

pub use url::{UrlError, canonicalize, is_fetchable};

use crate::request::{InterceptedRequest, ShellResponse};

/// Error type for network transport failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("timed out: {0}")]
    Timeout(String),
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::UnsupportedScheme(scheme) => Error::InvalidUrl(format!("unsupported scheme: {scheme}")),
            TransportError::Network(msg) => Error::Network(msg),
            TransportError::Timeout(msg) => Error::FetchTimeout(msg),
        }
    }
}

/// Standard request/response fetch.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the request over the network.
    async fn fetch(&self, request: &InterceptedRequest) -> Result<ShellResponse, TransportError>;
}

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "shellcache/0.1")
    pub user_agent: String,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "shellcache/0.1".to_string(),
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// reqwest-backed [`Transport`].
pub struct HttpTransport {
    http: Client,
    config: FetchConfig,
}

impl HttpTransport {
    /// Create a new transport with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn classify_error(err: reqwest::Error) -> TransportError {
        if err.is_timeout() { TransportError::Timeout(err.to_string()) } else { TransportError::Network(err.to_string()) }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<ShellResponse, TransportError> {
        if !is_fetchable(&request.url) {
            return Err(TransportError::UnsupportedScheme(request.url.scheme().to_string()));
        }

        let start = Instant::now();
        let response = self
            .http
            .request(request.method.clone(), request.url.as_str())
            .headers(request.headers.clone())
            .send()
            .await
            .map_err(Self::classify_error)?;

        let status = response.status();
        let final_url = response.url().clone();
        let headers = response.headers().clone();

        let body = response.bytes().await.map_err(Self::classify_error)?;

        tracing::debug!(
            "{} {} -> {} {} in {}ms ({} bytes)",
            request.method,
            request.url,
            status.as_u16(),
            final_url,
            start.elapsed().as_millis(),
            body.len()
        );

        Ok(ShellResponse { url: final_url, status, headers, body })
    }
}
