//! Worker lifecycle: install, activate, then intercept.
//!
//! ```text
//! Uninstalled → Installing → Installed (waiting) → Activating → Active
//! ```
//!
//! Population completes before activation can start, and stale generations
//! are deleted before clients are claimed. A generation leaves the waiting
//! state immediately when install asked to skip waiting, or once no client
//! is left open.
//!
//! An active generation whose population failed can be installed again; it
//! returns straight to `Active` once repopulated.

pub mod clients;
pub mod manager;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shellcache_core::{AppConfig, CacheStorage, Error};
use tokio::sync::{RwLock, RwLockWriteGuard};

pub use clients::ClientRegistry;
pub use manager::{CleanupReport, GenerationManager, InstallReport};

use crate::fetch::Transport;
use crate::request::{InterceptedRequest, ShellResponse};
use crate::router::{RouteDecision, Routed, Router};
use crate::rules::ExclusionRules;

/// Lifecycle state of the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Uninstalled,
    Installing,
    Installed,
    Activating,
    Active,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LifecycleState::Uninstalled => "uninstalled",
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Activating => "activating",
            LifecycleState::Active => "active",
        };
        f.write_str(name)
    }
}

/// Result of activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationReport {
    pub generation: String,
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
    /// Clients whose controller changed to this generation.
    pub claimed: usize,
}

/// Result of [`ShellWorker::start`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartReport {
    pub install: InstallReport,
    pub activation: Option<ActivationReport>,
    pub state: LifecycleState,
}

/// The background process: one generation manager, one router, the clients
/// they control and the lifecycle state tying them together.
pub struct ShellWorker {
    manager: GenerationManager,
    router: Router,
    store: Arc<dyn CacheStorage>,
    transport: Arc<dyn Transport>,
    clients: ClientRegistry,
    state: RwLock<LifecycleState>,
}

impl ShellWorker {
    /// Build a worker for the configured cache version.
    pub fn new(config: &AppConfig, store: Arc<dyn CacheStorage>, transport: Arc<dyn Transport>) -> Result<Self, Error> {
        let manifest = config.manifest_urls().map_err(|e| Error::InvalidInput(e.to_string()))?;
        let offline_url = config.offline_url().map_err(|e| Error::InvalidInput(e.to_string()))?;
        let cache_name = config.cache_name();

        let manager = GenerationManager::new(cache_name.clone(), manifest, store.clone(), transport.clone())
            .with_max_bytes(config.max_bytes);
        let router = Router::new(
            cache_name,
            ExclusionRules::from_config(config),
            offline_url,
            store.clone(),
            transport.clone(),
        );

        Ok(Self {
            manager,
            router,
            store,
            transport,
            clients: ClientRegistry::new(),
            state: RwLock::new(LifecycleState::Uninstalled),
        })
    }

    pub fn cache_name(&self) -> &str {
        self.manager.cache_name()
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.read().await
    }

    async fn transition(&self, from: &[LifecycleState], to: LifecycleState) -> Result<(), Error> {
        let mut state = self.state.write().await;
        if !from.contains(&*state) {
            return Err(Error::Lifecycle(format!("cannot move from {} to {to}", *state)));
        }
        tracing::debug!(generation = %self.cache_name(), from = %*state, %to, "lifecycle transition");
        *state = to;
        Ok(())
    }

    /// Pick up where a previous process left off.
    ///
    /// A populated current generation is either active (it is the only
    /// generation) or still waiting to retire older ones. A current generation
    /// that was opened but never populated counts as not installed.
    pub async fn resume(&self) -> Result<LifecycleState, Error> {
        let names = self.store.names().await?;
        let populated = self.store.is_populated(self.cache_name()).await?;
        let next = if !populated {
            LifecycleState::Uninstalled
        } else if names.len() == 1 {
            LifecycleState::Active
        } else {
            LifecycleState::Installed
        };

        self.transition(&[LifecycleState::Uninstalled], next).await?;
        tracing::info!(generation = %self.cache_name(), state = %next, "resumed");
        Ok(next)
    }

    /// Install: populate the current generation.
    ///
    /// Population failures are reported in the [`InstallReport`], not as
    /// errors; the worker still reaches [`LifecycleState::Installed`]. From
    /// `Active` only an unpopulated generation may be installed again, and
    /// the worker stays the active one.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let previous = {
            let mut state = self.state.write().await;
            let previous = *state;
            match previous {
                LifecycleState::Uninstalled | LifecycleState::Installed => {}
                LifecycleState::Active if !self.store.is_populated(self.cache_name()).await? => {
                    tracing::info!(generation = %self.cache_name(), "repopulating active generation");
                }
                LifecycleState::Active => {
                    return Err(Error::Lifecycle(format!(
                        "{} is already populated and active; bump the cache version to install a new generation",
                        self.cache_name()
                    )));
                }
                other => return Err(Error::Lifecycle(format!("cannot move from {other} to installing"))),
            }
            *state = LifecycleState::Installing;
            previous
        };

        let report = self.manager.install().await;

        let next =
            if previous == LifecycleState::Active { LifecycleState::Active } else { LifecycleState::Installed };
        self.transition(&[LifecycleState::Installing], next).await?;
        Ok(report)
    }

    /// Activate: delete stale generations, then claim every open client.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        let mut state = self.state.write().await;
        self.activate_locked(&mut state).await
    }

    /// Activation with the state lock already held, so the check and the
    /// transition cannot interleave with another caller.
    async fn activate_locked(
        &self, state: &mut RwLockWriteGuard<'_, LifecycleState>,
    ) -> Result<ActivationReport, Error> {
        if **state != LifecycleState::Installed {
            return Err(Error::Lifecycle(format!("cannot move from {} to activating", **state)));
        }
        **state = LifecycleState::Activating;

        let cleanup = match self.manager.cleanup().await {
            Ok(report) => report,
            Err(err) => {
                tracing::warn!(error = %err, "could not enumerate cache generations; skipping cleanup");
                CleanupReport::default()
            }
        };

        let claimed = self.clients.claim(self.cache_name()).await;
        **state = LifecycleState::Active;
        tracing::info!(generation = %self.cache_name(), claimed, deleted = cleanup.deleted.len(), "activated");

        Ok(ActivationReport {
            generation: self.cache_name().to_string(),
            deleted: cleanup.deleted,
            failed: cleanup.failed,
            claimed,
        })
    }

    /// Install, then activate right away if install asked to skip waiting or
    /// no client is open to wait for.
    pub async fn start(&self) -> Result<StartReport, Error> {
        let install = self.install().await?;

        let waiting = self.state().await == LifecycleState::Installed;
        let activation = if waiting && (install.skip_waiting || self.clients.is_empty().await) {
            Some(self.activate().await?)
        } else {
            if waiting {
                tracing::info!(generation = %self.cache_name(), "waiting for open clients to close");
            }
            None
        };

        Ok(StartReport { install, activation, state: self.state().await })
    }

    /// Register a client. It is controlled immediately if the worker is active.
    pub async fn connect_client(&self, id: &str) {
        let controller = (self.state().await == LifecycleState::Active).then(|| self.cache_name());
        self.clients.connect(id, controller).await;
    }

    /// Release a client; a waiting generation activates once none remain.
    pub async fn release_client(&self, id: &str) -> Result<Option<ActivationReport>, Error> {
        let mut state = self.state.write().await;
        let remaining = self.clients.release(id).await;
        if remaining == 0 && *state == LifecycleState::Installed {
            return self.activate_locked(&mut state).await.map(Some);
        }
        Ok(None)
    }

    async fn controls(&self, client: Option<&str>) -> bool {
        match client {
            Some(id) => self.clients.controller(id).await.as_deref() == Some(self.cache_name()),
            None => self.state().await == LifecycleState::Active,
        }
    }

    /// Intercept a request from `client` (or from an anonymous context).
    ///
    /// Requests from contexts this worker does not control are not
    /// intercepted and come back as [`Routed::Bypass`].
    pub async fn handle_fetch(&self, client: Option<&str>, request: &InterceptedRequest) -> Result<Routed, Error> {
        if !self.controls(client).await {
            tracing::debug!(url = %request.url, client, "uncontrolled client, not intercepting");
            return Ok(Routed::Bypass);
        }
        self.router.route(request).await
    }

    /// Intercept a request and settle it into a response.
    ///
    /// A bypassed request takes the default network path; a request that
    /// failed both cache and network becomes an error.
    pub async fn respond(
        &self, client: Option<&str>, request: &InterceptedRequest,
    ) -> Result<(RouteDecision, ShellResponse), Error> {
        match self.handle_fetch(client, request).await? {
            Routed::Bypass => {
                let response = self.transport.fetch(request).await?;
                Ok((RouteDecision::Bypass, response))
            }
            Routed::Respond { decision, response } => Ok((decision, response)),
            Routed::Failed(err) => Err(err.into()),
        }
    }
}
