//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the worker.
use std::sync::Arc;

use crate::tools::{
    ClientParams, ShellFetchParams, activate_impl, connect_impl, fetch_impl, generations_impl, install_impl,
    release_impl,
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use shellcache_client::ShellWorker;
use shellcache_core::CacheDb;
use url::Url;

/// The main MCP server handler for shellcache.
#[derive(Clone)]
pub struct ShellCacheServer {
    tool_router: ToolRouter<Self>,
    worker: Arc<ShellWorker>,
    db: CacheDb,
    origin: Url,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// Each tool is one lifecycle signal from the host runtime; the tool call
/// returns once the step has completed.
#[tool_router]
impl ShellCacheServer {
    /// Create a new server handler around a running worker.
    pub fn new(worker: Arc<ShellWorker>, db: CacheDb, origin: Url) -> Self {
        Self { tool_router: Self::tool_router(), worker, db, origin }
    }

    #[tool(description = "Install the current cache generation: fetch and store every app shell resource.")]
    async fn shell_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.worker).await
    }

    #[tool(description = "Activate the installed generation: delete stale generations, then claim all open clients.")]
    async fn shell_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.worker).await
    }

    #[tool(description = "Route one request through the offline cache. Returns the routing decision and the response.")]
    async fn shell_fetch(&self, params: Parameters<ShellFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.worker, &self.origin, params.0).await
    }

    #[tool(description = "Register an open client context (tab).")]
    async fn client_connect(&self, params: Parameters<ClientParams>) -> Result<CallToolResult, McpError> {
        connect_impl(&self.worker, params.0).await
    }

    #[tool(description = "Release a client context. A waiting generation activates once no client is left.")]
    async fn client_release(&self, params: Parameters<ClientParams>) -> Result<CallToolResult, McpError> {
        release_impl(&self.worker, params.0).await
    }

    #[tool(description = "List cache generations in storage with entry counts.")]
    async fn cache_generations(&self) -> Result<CallToolResult, McpError> {
        generations_impl(&self.db, self.worker.cache_name()).await
    }
}

impl ServerHandler for ShellCacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "shellcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
