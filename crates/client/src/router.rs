//! Per-request routing policy.
//!
//! Every intercepted request is answered exactly once, first matching rule wins:
//!
//! 1. exclusion rule matches → [`Routed::Bypass`], cache and network untouched
//! 2. stored response in the current generation → served verbatim
//! 3. cache miss → network response, unmodified and not re-cached
//! 4. network failure → offline document for navigations, otherwise failure

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shellcache_core::{CacheStorage, Error};
use url::Url;

use crate::fetch::{Transport, TransportError};
use crate::request::{InterceptedRequest, ShellResponse};
use crate::rules::ExclusionRules;

/// How a request was answered. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteDecision {
    Bypass,
    CacheHit,
    CacheMissNetworkOk,
    CacheMissNetworkFailFallback,
    CacheMissNetworkFailNoFallback,
}

impl std::fmt::Display for RouteDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RouteDecision::Bypass => "BYPASS",
            RouteDecision::CacheHit => "CACHE_HIT",
            RouteDecision::CacheMissNetworkOk => "CACHE_MISS_NETWORK_OK",
            RouteDecision::CacheMissNetworkFailFallback => "CACHE_MISS_NETWORK_FAIL_FALLBACK",
            RouteDecision::CacheMissNetworkFailNoFallback => "CACHE_MISS_NETWORK_FAIL_NOFALLBACK",
        };
        f.write_str(name)
    }
}

/// Outcome of routing one request.
#[derive(Debug)]
pub enum Routed {
    /// Not intercepted; the host performs its default network fetch.
    Bypass,
    /// Answered by the router.
    Respond { decision: RouteDecision, response: ShellResponse },
    /// Cache miss and network failure with no substitute body.
    Failed(TransportError),
}

impl Routed {
    pub fn decision(&self) -> RouteDecision {
        match self {
            Routed::Bypass => RouteDecision::Bypass,
            Routed::Respond { decision, .. } => *decision,
            Routed::Failed(_) => RouteDecision::CacheMissNetworkFailNoFallback,
        }
    }
}

/// Cache-first router bound to one cache generation.
pub struct Router {
    cache_name: String,
    rules: ExclusionRules,
    offline_url: Url,
    store: Arc<dyn CacheStorage>,
    transport: Arc<dyn Transport>,
}

impl Router {
    pub fn new(
        cache_name: impl Into<String>, rules: ExclusionRules, offline_url: Url, store: Arc<dyn CacheStorage>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self { cache_name: cache_name.into(), rules, offline_url, store, transport }
    }

    pub fn rules(&self) -> &ExclusionRules {
        &self.rules
    }

    /// Decide how to answer `request` and produce the answer.
    ///
    /// # Errors
    ///
    /// Only storage failures are errors; network failures are part of the
    /// policy and come back as [`Routed::Failed`].
    pub async fn route(&self, request: &InterceptedRequest) -> Result<Routed, Error> {
        if let Some(rule) = self.rules.first_match(request) {
            tracing::debug!(method = %request.method, url = %request.url, ?rule, "bypass");
            return Ok(Routed::Bypass);
        }

        if let Some(entry) = self.store.lookup(&self.cache_name, &request.cache_key()).await? {
            tracing::debug!(url = %request.url, generation = %self.cache_name, "cache hit");
            let response = ShellResponse::from_cached(entry)?;
            return Ok(Routed::Respond { decision: RouteDecision::CacheHit, response });
        }

        match self.transport.fetch(request).await {
            Ok(response) => {
                tracing::debug!(url = %request.url, status = response.status.as_u16(), "cache miss, network ok");
                Ok(Routed::Respond { decision: RouteDecision::CacheMissNetworkOk, response })
            }
            Err(err) => {
                tracing::error!(url = %request.url, error = %err, "network fetch failed");
                if request.is_navigation() {
                    if let Some(response) = self.offline_document().await? {
                        tracing::info!(url = %request.url, offline = %self.offline_url, "serving offline document");
                        return Ok(Routed::Respond { decision: RouteDecision::CacheMissNetworkFailFallback, response });
                    }
                    tracing::warn!(generation = %self.cache_name, "offline document missing from cache generation");
                }
                Ok(Routed::Failed(err))
            }
        }
    }

    async fn offline_document(&self) -> Result<Option<ShellResponse>, Error> {
        let key = InterceptedRequest::get(self.offline_url.clone()).cache_key();
        match self.store.lookup(&self.cache_name, &key).await? {
            Some(entry) => Ok(Some(ShellResponse::from_cached(entry)?)),
            None => Ok(None),
        }
    }
}
