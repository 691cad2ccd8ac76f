//! shellcache MCP server entry point.
//!
//! Boots the worker (install and activate, or resume a previous run) and
//! serves it as MCP tools on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use shellcache_client::{FetchConfig, HttpTransport, LifecycleState, ShellWorker};
use shellcache_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(generation = %config.cache_name(), "Starting shellcache server on stdio transport");

    let db = CacheDb::open(&config.db_path).await?;
    let transport = Arc::new(HttpTransport::new(FetchConfig::from(&config))?);
    let worker = Arc::new(ShellWorker::new(&config, Arc::new(db.clone()), transport)?);

    match worker.resume().await? {
        LifecycleState::Uninstalled => {
            let report = worker.start().await?;
            tracing::info!(state = %report.state, populated = report.install.populated, "worker started");
        }
        LifecycleState::Installed => {
            worker.activate().await?;
        }
        state => tracing::info!(%state, "worker resumed"),
    }

    let handler = handler::ShellCacheServer::new(worker, db, config.origin_url()?);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
