//! shell_fetch tool implementation.
//!
//! Routes one request through the worker exactly as a controlled page's
//! request would be: bypass, cache-first, then network with offline fallback.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::{InterceptedRequest, RouteDecision, ShellWorker};
use shellcache_core::Error;
use url::Url;

use crate::tools::json_result;

/// Input parameters for the shell_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShellFetchParams {
    /// Absolute URL, or a path relative to the configured origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Force a navigation (true) or subresource (false) request.
    /// Derived from `Sec-Fetch-Mode` / `Accept` headers when omitted.
    #[serde(default)]
    pub navigate: Option<bool>,

    /// Request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Client issuing the request. Omitted means any context, intercepted
    /// only while the worker is active.
    #[serde(default)]
    pub client_id: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// How [`ShellFetchOutput::body`] is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyEncoding {
    Utf8,
    Base64,
}

/// Bodies that are valid UTF-8 are returned as text, anything else as base64.
fn encode_body(body: &[u8]) -> (BodyEncoding, String) {
    match std::str::from_utf8(body) {
        Ok(text) => (BodyEncoding::Utf8, text.to_string()),
        Err(_) => (BodyEncoding::Base64, STANDARD.encode(body)),
    }
}

/// Output structure for the shell_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellFetchOutput {
    pub decision: RouteDecision,
    /// URL the response was produced for.
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body_bytes: usize,
    pub body_encoding: BodyEncoding,
    pub body: String,
}

/// Implementation of the shell_fetch tool.
pub async fn fetch_impl(worker: &ShellWorker, origin: &Url, params: ShellFetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    let headers: Vec<(String, String)> = params.headers.into_iter().collect();
    let request = InterceptedRequest::parse(&params.method, &params.url, &headers, params.navigate, Some(origin))?;

    let (decision, response) = worker.respond(params.client_id.as_deref(), &request).await?;
    tracing::debug!(url = %request.url, %decision, status = response.status.as_u16(), "shell_fetch");

    let (body_encoding, body) = encode_body(&response.body);
    json_result(&ShellFetchOutput {
        decision,
        url: response.url.to_string(),
        status: response.status.as_u16(),
        content_type: response.content_type().map(str::to_string),
        body_bytes: response.body.len(),
        body_encoding,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{text, worker};
    use std::sync::atomic::Ordering;

    fn origin() -> Url {
        Url::parse("http://localhost:8080/").unwrap()
    }

    fn params(url: &str) -> ShellFetchParams {
        ShellFetchParams {
            url: url.into(),
            method: default_method(),
            navigate: None,
            headers: BTreeMap::new(),
            client_id: None,
        }
    }

    #[test]
    fn test_encode_body() {
        assert_eq!(encode_body(b"<html></html>"), (BodyEncoding::Utf8, "<html></html>".to_string()));
        assert_eq!(encode_body(&[0x89, b'P', b'N', b'G']), (BodyEncoding::Base64, "iVBORw==".to_string()));
    }

    #[tokio::test]
    async fn test_fetch_empty_url() {
        let (worker, _, _) = worker().await;
        let result = fetch_impl(&worker, &origin(), params("  ")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fetch_relative_manifest_path_hits_cache() {
        let (worker, _, transport) = worker().await;
        worker.start().await.unwrap();
        transport.offline.store(true, Ordering::SeqCst);

        let result = fetch_impl(&worker, &origin(), params("manifest.json")).await.unwrap();
        let output: ShellFetchOutput = serde_json::from_str(&text(&result)).unwrap();
        assert_eq!(output.decision, RouteDecision::CacheHit);
        assert_eq!(output.url, "http://localhost:8080/manifest.json");
        assert_eq!(output.body_encoding, BodyEncoding::Utf8);
        assert_eq!(output.body, "<html>shell</html>");
    }

    #[tokio::test]
    async fn test_fetch_offline_navigation_falls_back() {
        let (worker, _, transport) = worker().await;
        worker.start().await.unwrap();
        transport.offline.store(true, Ordering::SeqCst);

        let mut request = params("/turmas/3a");
        request.headers.insert("Sec-Fetch-Mode".into(), "navigate".into());
        let result = fetch_impl(&worker, &origin(), request).await.unwrap();
        let output: ShellFetchOutput = serde_json::from_str(&text(&result)).unwrap();
        assert_eq!(output.decision, RouteDecision::CacheMissNetworkFailFallback);
        assert_eq!(output.status, 200);
    }

    #[tokio::test]
    async fn test_fetch_offline_subresource_fails() {
        let (worker, _, transport) = worker().await;
        worker.start().await.unwrap();
        transport.offline.store(true, Ordering::SeqCst);

        let result = fetch_impl(&worker, &origin(), params("/js/extra.js")).await;
        let err = result.unwrap_err();
        assert_eq!(err.code.0, -32005);
    }

    #[tokio::test]
    async fn test_fetch_post_is_bypassed() {
        let (worker, _, _) = worker().await;
        worker.start().await.unwrap();

        let mut request = params("/api/notes");
        request.method = "post".into();
        let result = fetch_impl(&worker, &origin(), request).await.unwrap();
        let output: ShellFetchOutput = serde_json::from_str(&text(&result)).unwrap();
        assert_eq!(output.decision, RouteDecision::Bypass);
    }
}
