//! Cache generation manager: populate at install, retire at activation.

use std::sync::Arc;

use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};
use shellcache_core::{CacheStorage, CachedResponse, Error};
use url::Url;

use crate::fetch::Transport;
use crate::request::InterceptedRequest;

/// Result of an install attempt. Install itself never fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReport {
    pub generation: String,
    /// Whether the whole app shell was stored.
    pub populated: bool,
    pub entries: usize,
    /// Whether the host should activate without waiting for clients to close.
    pub skip_waiting: bool,
    pub error: Option<String>,
}

/// Result of deleting stale generations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub deleted: Vec<String>,
    /// Generations whose deletion failed; not retried.
    pub failed: Vec<String>,
}

/// Owns one named, versioned cache generation.
pub struct GenerationManager {
    cache_name: String,
    manifest: Vec<Url>,
    max_bytes: usize,
    store: Arc<dyn CacheStorage>,
    transport: Arc<dyn Transport>,
}

impl GenerationManager {
    pub fn new(
        cache_name: impl Into<String>, manifest: Vec<Url>, store: Arc<dyn CacheStorage>, transport: Arc<dyn Transport>,
    ) -> Self {
        Self { cache_name: cache_name.into(), manifest, max_bytes: usize::MAX, store, transport }
    }

    /// Refuse to store any manifest resource larger than `max_bytes`.
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub fn manifest(&self) -> &[Url] {
        &self.manifest
    }

    /// Open the current generation and store every manifest resource.
    ///
    /// Population is all-or-nothing. A failure is logged and reported, never
    /// returned: the generation stays open but unpopulated.
    pub async fn install(&self) -> InstallReport {
        tracing::info!(generation = %self.cache_name, resources = self.manifest.len(), "installing");

        match self.populate().await {
            Ok(entries) => {
                tracing::info!(generation = %self.cache_name, entries, "app shell cached");
                InstallReport {
                    generation: self.cache_name.clone(),
                    populated: true,
                    entries,
                    skip_waiting: true,
                    error: None,
                }
            }
            Err(err) => {
                tracing::error!(generation = %self.cache_name, error = %err, "failed to cache app shell");
                InstallReport {
                    generation: self.cache_name.clone(),
                    populated: false,
                    entries: 0,
                    skip_waiting: false,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    async fn populate(&self) -> Result<usize, Error> {
        self.store.open(&self.cache_name).await?;

        let fetches = self.manifest.iter().map(|url| self.fetch_resource(url));
        let entries = try_join_all(fetches).await?;

        self.store.populate(&self.cache_name, entries).await
    }

    async fn fetch_resource(&self, url: &Url) -> Result<CachedResponse, Error> {
        let request = InterceptedRequest::get(url.clone());
        let response = self
            .transport
            .fetch(&request)
            .await
            .map_err(|e| Error::PopulationFailed(format!("{url}: {e}")))?;

        if !response.status.is_success() {
            return Err(Error::PopulationFailed(format!("{url}: status {}", response.status.as_u16())));
        }
        if response.body.len() > self.max_bytes {
            return Err(Error::PopulationFailed(format!(
                "{url}: {} bytes exceeds limit of {}",
                response.body.len(),
                self.max_bytes
            )));
        }

        Ok(response.to_cached(&request))
    }

    /// Delete every generation in storage except the current one.
    ///
    /// Best effort: each deletion is attempted once, failures are logged and
    /// reported.
    pub async fn cleanup(&self) -> Result<CleanupReport, Error> {
        let mut report = CleanupReport::default();

        for name in self.store.names().await? {
            if name == self.cache_name {
                continue;
            }
            match self.store.delete(&name).await {
                Ok(_) => {
                    tracing::info!(generation = %name, "deleted stale cache generation");
                    report.deleted.push(name);
                }
                Err(err) => {
                    tracing::warn!(generation = %name, error = %err, "failed to delete stale cache generation");
                    report.failed.push(name);
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountingStore, MockTransport};
    use reqwest::StatusCode;
    use shellcache_core::CacheDb;

    const INDEX: &str = "http://localhost:8080/index.html";
    const MANIFEST: &str = "http://localhost:8080/manifest.json";
    const ICON: &str = "http://localhost:8080/icon.png";

    fn manifest() -> Vec<Url> {
        [INDEX, MANIFEST, ICON].iter().map(|u| Url::parse(u).unwrap()).collect()
    }

    fn serve_shell(transport: &MockTransport) {
        transport.serve(INDEX, "text/html", b"<html>shell</html>");
        transport.serve(MANIFEST, "application/manifest+json", b"{\"name\":\"NATA\"}");
        transport.serve(ICON, "image/png", &[0x89, b'P', b'N', b'G']);
    }

    #[tokio::test]
    async fn test_install_stores_every_resource_byte_identical() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let transport = Arc::new(MockTransport::new());
        serve_shell(&transport);
        let manager = GenerationManager::new("app-cache-v1", manifest(), Arc::new(db.clone()), transport.clone());

        let report = manager.install().await;
        assert!(report.populated);
        assert!(report.skip_waiting);
        assert_eq!(report.entries, 3);
        assert!(db.is_generation_populated("app-cache-v1").await.unwrap());

        for (url, body) in [(INDEX, &b"<html>shell</html>"[..]), (ICON, &[0x89, b'P', b'N', b'G'][..])] {
            let key = InterceptedRequest::get(Url::parse(url).unwrap()).cache_key();
            let entry = db.match_entry("app-cache-v1", &key).await.unwrap().unwrap();
            assert_eq!(entry.body, body);
        }
    }

    #[tokio::test]
    async fn test_install_failure_is_atomic_and_swallowed() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let transport = Arc::new(MockTransport::new());
        serve_shell(&transport);
        transport.fail(ICON);
        let manager = GenerationManager::new("app-cache-v1", manifest(), Arc::new(db.clone()), transport);

        let report = manager.install().await;
        assert!(!report.populated);
        assert!(!report.skip_waiting);
        assert!(report.error.as_deref().unwrap().starts_with("POPULATION_FAILED"));

        assert_eq!(db.generation_names().await.unwrap(), vec!["app-cache-v1".to_string()]);
        assert!(!db.is_generation_populated("app-cache-v1").await.unwrap());
        assert!(db.entry_urls("app-cache-v1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_install_rejects_error_status() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let transport = Arc::new(MockTransport::new());
        serve_shell(&transport);
        transport.serve_status(MANIFEST, StatusCode::NOT_FOUND, "text/plain", b"missing");
        let manager = GenerationManager::new("app-cache-v1", manifest(), Arc::new(db.clone()), transport);

        let report = manager.install().await;
        assert!(!report.populated);
        assert!(report.error.unwrap().contains("status 404"));
    }

    #[tokio::test]
    async fn test_install_rejects_oversized_resource() {
        static ICON_BYTES: [u8; 64] = [0x42; 64];
        let db = CacheDb::open_in_memory().await.unwrap();
        let transport = Arc::new(MockTransport::new());
        serve_shell(&transport);
        transport.serve(ICON, "image/png", &ICON_BYTES);
        let manager =
            GenerationManager::new("app-cache-v1", manifest(), Arc::new(db.clone()), transport).with_max_bytes(32);

        let report = manager.install().await;
        assert!(!report.populated);
        assert!(report.error.unwrap().contains("64 bytes exceeds limit of 32"));
        assert!(!db.is_generation_populated("app-cache-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_cleanup_keeps_only_current_generation() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_generation("app-cache-v1").await.unwrap();
        db.open_generation("other-app-cache-v9").await.unwrap();
        db.open_generation("app-cache-v2").await.unwrap();
        let manager =
            GenerationManager::new("app-cache-v2", manifest(), Arc::new(db.clone()), Arc::new(MockTransport::new()));

        let report = manager.cleanup().await.unwrap();
        assert_eq!(report.deleted.len(), 2);
        assert!(report.failed.is_empty());
        assert_eq!(db.generation_names().await.unwrap(), vec!["app-cache-v2".to_string()]);
    }

    #[tokio::test]
    async fn test_cleanup_is_best_effort() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_generation("app-cache-v0").await.unwrap();
        db.open_generation("app-cache-v1").await.unwrap();
        db.open_generation("app-cache-v2").await.unwrap();
        let store = Arc::new(CountingStore::new(db.clone()));
        store.refuse_delete("app-cache-v0");
        let manager = GenerationManager::new("app-cache-v2", manifest(), store, Arc::new(MockTransport::new()));

        let report = manager.cleanup().await.unwrap();
        assert_eq!(report.deleted, vec!["app-cache-v1".to_string()]);
        assert_eq!(report.failed, vec!["app-cache-v0".to_string()]);
        assert_eq!(
            db.generation_names().await.unwrap(),
            vec!["app-cache-v0".to_string(), "app-cache-v2".to_string()]
        );
    }
}
