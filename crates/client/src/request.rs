//! Intercepted request and response types.
//!
//! Requests carry enough context for the router to decide how to answer
//! them: method, canonical URL, headers and whether the client is loading a
//! top-level document. Responses are full payloads, either fresh from the
//! network or rebuilt from a stored [`CachedResponse`].

use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use shellcache_core::cache::hash::compute_request_key;
use shellcache_core::{CachedResponse, Error};
use url::Url;

use crate::fetch::canonicalize;

/// What the client intends to do with the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestMode {
    /// Loading a top-level document.
    Navigate,
    /// Loading a stylesheet, script, image, manifest, API response...
    Subresource,
}

/// Classify a request from its fetch metadata.
///
/// `Sec-Fetch-Mode` wins when present. Without it, a GET whose `Accept`
/// header lists `text/html` first is treated as a navigation.
pub fn classify(method: &Method, headers: &HeaderMap) -> RequestMode {
    if let Some(mode) = headers.get("sec-fetch-mode").and_then(|v| v.to_str().ok()) {
        return if mode.trim().eq_ignore_ascii_case("navigate") { RequestMode::Navigate } else { RequestMode::Subresource };
    }

    let prefers_html = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .and_then(|accept| accept.split(',').next())
        .map(|first| first.split(';').next().unwrap_or("").trim().eq_ignore_ascii_case("text/html"))
        .unwrap_or(false);

    if *method == Method::GET && prefers_html { RequestMode::Navigate } else { RequestMode::Subresource }
}

/// A request leaving a controlled client.
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub mode: RequestMode,
}

impl InterceptedRequest {
    /// Create a subresource request with no headers.
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url, headers: HeaderMap::new(), mode: RequestMode::Subresource }
    }

    /// A plain GET for a subresource.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// A GET navigation to a top-level document.
    pub fn navigate(url: Url) -> Self {
        Self { mode: RequestMode::Navigate, ..Self::get(url) }
    }

    /// Parse a request from host-supplied strings.
    ///
    /// `navigate` forces the mode; when `None` the mode is derived from the
    /// headers via [`classify`].
    pub fn parse(
        method: &str, url: &str, headers: &[(String, String)], navigate: Option<bool>, base: Option<&Url>,
    ) -> Result<Self, Error> {
        let method = Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid method {method:?}: {e}")))?;
        let url = canonicalize(url, base).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::InvalidInput(format!("invalid header name {name:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::InvalidInput(format!("invalid header value for {name}: {e}")))?;
            header_map.append(name, value);
        }

        let mode = match navigate {
            Some(true) => RequestMode::Navigate,
            Some(false) => RequestMode::Subresource,
            None => classify(&method, &header_map),
        };

        Ok(Self { method, url, headers: header_map, mode })
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Request identity used as the cache key.
    pub fn cache_key(&self) -> String {
        compute_request_key(self.method.as_str(), self.url.as_str())
    }
}

/// A full response payload.
#[derive(Debug, Clone)]
pub struct ShellResponse {
    /// The URL the response was produced for (after redirects).
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ShellResponse {
    /// Content-Type header, if present and valid UTF-8.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Snapshot this response for storage under `request`'s identity.
    pub fn to_cached(&self, request: &InterceptedRequest) -> CachedResponse {
        let headers: Vec<(String, String)> = self
            .headers
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.to_string(), v.to_string())))
            .collect();

        CachedResponse {
            key: request.cache_key(),
            method: request.method.to_string(),
            url: request.url.to_string(),
            status_code: self.status.as_u16(),
            content_type: self.content_type().map(str::to_string),
            headers_json: serde_json::to_string(&headers).ok(),
            body: self.body.to_vec(),
            fetched_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Rebuild a response from a stored entry, byte for byte.
    pub fn from_cached(entry: CachedResponse) -> Result<Self, Error> {
        let url = Url::parse(&entry.url).map_err(|e| Error::InvalidUrl(format!("stored entry {}: {e}", entry.url)))?;
        let status = StatusCode::from_u16(entry.status_code)
            .map_err(|e| Error::InvalidInput(format!("stored status {}: {e}", entry.status_code)))?;

        let pairs: Vec<(String, String)> = entry
            .headers_json
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok())
            .unwrap_or_default();

        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(&value)) {
                headers.append(name, value);
            }
        }
        if !headers.contains_key(header::CONTENT_TYPE)
            && let Some(content_type) = entry.content_type.as_deref().and_then(|ct| HeaderValue::from_str(ct).ok())
        {
            headers.insert(header::CONTENT_TYPE, content_type);
        }

        Ok(Self { url, status, headers, body: Bytes::from(entry.body) })
    }
}
