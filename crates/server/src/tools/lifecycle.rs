//! Lifecycle tools: install, activate and client bookkeeping.
//!
//! Population failures are not tool errors; they show up as
//! `"populated": false` in the install output.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::{ActivationReport, ShellWorker};

use crate::tools::json_result;

/// Parameters for the client_connect and client_release tools.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClientParams {
    /// Opaque client (tab) identifier chosen by the host.
    pub client_id: String,
}

/// Output from the client_connect tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConnectOutput {
    pub client_id: String,
    /// Generation controlling the client, if any.
    pub controller: Option<String>,
}

/// Output from the client_release tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientReleaseOutput {
    pub client_id: String,
    /// Set when releasing the last client let a waiting generation activate.
    pub activation: Option<ActivationReport>,
}

/// Implementation of the shell_install tool.
pub async fn install_impl(worker: &ShellWorker) -> Result<CallToolResult, McpError> {
    let report = worker.install().await?;
    json_result(&report)
}

/// Implementation of the shell_activate tool.
pub async fn activate_impl(worker: &ShellWorker) -> Result<CallToolResult, McpError> {
    let report = worker.activate().await?;
    json_result(&report)
}

/// Implementation of the client_connect tool.
pub async fn connect_impl(worker: &ShellWorker, params: ClientParams) -> Result<CallToolResult, McpError> {
    worker.connect_client(&params.client_id).await;
    let controller = worker.clients().controller(&params.client_id).await;
    json_result(&ClientConnectOutput { client_id: params.client_id, controller })
}

/// Implementation of the client_release tool.
pub async fn release_impl(worker: &ShellWorker, params: ClientParams) -> Result<CallToolResult, McpError> {
    let activation = worker.release_client(&params.client_id).await?;
    json_result(&ClientReleaseOutput { client_id: params.client_id, activation })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{text, worker};
    use shellcache_client::InstallReport;

    #[tokio::test]
    async fn test_install_then_activate() {
        let (worker, db, _) = worker().await;

        let result = install_impl(&worker).await.unwrap();
        let report: InstallReport = serde_json::from_str(&text(&result)).unwrap();
        assert!(report.populated);
        assert_eq!(report.entries, 4);

        let result = activate_impl(&worker).await.unwrap();
        let report: ActivationReport = serde_json::from_str(&text(&result)).unwrap();
        assert_eq!(report.generation, "nata-escolar-cache-v1");
        assert_eq!(db.generation_names().await.unwrap(), vec!["nata-escolar-cache-v1".to_string()]);
    }

    #[tokio::test]
    async fn test_activate_before_install_is_error() {
        let (worker, _, _) = worker().await;
        let result = activate_impl(&worker).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_install_offline_reports_unpopulated() {
        let (worker, _, transport) = worker().await;
        transport.offline.store(true, std::sync::atomic::Ordering::SeqCst);

        let result = install_impl(&worker).await.unwrap();
        let report: InstallReport = serde_json::from_str(&text(&result)).unwrap();
        assert!(!report.populated);
        assert!(!report.skip_waiting);
    }

    #[tokio::test]
    async fn test_install_repopulates_after_offline_start() {
        use std::sync::atomic::Ordering;

        let (worker, db, transport) = worker().await;
        transport.offline.store(true, Ordering::SeqCst);
        let start = worker.start().await.unwrap();
        assert!(!start.install.populated);

        transport.offline.store(false, Ordering::SeqCst);
        let result = install_impl(&worker).await.unwrap();
        let report: InstallReport = serde_json::from_str(&text(&result)).unwrap();
        assert!(report.populated);
        assert!(db.is_generation_populated("nata-escolar-cache-v1").await.unwrap());

        let err = install_impl(&worker).await.unwrap_err();
        assert_eq!(err.code.0, -32004);
    }

    #[tokio::test]
    async fn test_connect_and_release_clients() {
        let (worker, _, _) = worker().await;
        worker.start().await.unwrap();

        let params = ClientParams { client_id: "tab-1".into() };
        let result = connect_impl(&worker, params.clone()).await.unwrap();
        let output: ClientConnectOutput = serde_json::from_str(&text(&result)).unwrap();
        assert_eq!(output.controller.as_deref(), Some("nata-escolar-cache-v1"));

        let result = release_impl(&worker, params).await.unwrap();
        let output: ClientReleaseOutput = serde_json::from_str(&text(&result)).unwrap();
        assert!(output.activation.is_none());
    }
}
