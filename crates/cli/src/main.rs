//! shellcache command line host.
//!
//! Drives the worker lifecycle against the configured store and network:
//! each command delivers one lifecycle signal and prints its JSON report.
//! Logs go to stderr; `fetch` writes the response body to stdout.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use shellcache_client::{FetchConfig, HttpTransport, InterceptedRequest, LifecycleState, ShellWorker};
use shellcache_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "shellcache")]
#[command(about = "Offline app shell cache: install, activate and route requests")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file (overrides SHELLCACHE_CONFIG_FILE)
    #[arg(short, long, env = "SHELLCACHE_CONFIG_FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Install the current generation and activate it (or resume a previous run)
    Start,
    /// Populate the current generation without activating it
    Install,
    /// Activate an installed generation, deleting every stale one
    Activate,
    /// Route one request through the cache
    Fetch {
        /// Absolute URL or path relative to the configured origin
        url: String,

        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Treat the request as a top-level navigation
        #[arg(long)]
        navigate: bool,

        /// Extra request header as `name: value` (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
    },
    /// List cache generations in storage
    Generations,
}

fn parse_header(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .with_context(|| format!("header {raw:?} is not in `name: value` form"))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load_with_file(cli.config.as_deref())?;

    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache store {}", config.db_path.display()))?;

    if let Command::Generations = cli.command {
        return print_json(&db.list_generations().await?);
    }

    let transport = Arc::new(HttpTransport::new(FetchConfig::from(&config))?);
    let worker = ShellWorker::new(&config, Arc::new(db), transport)?;

    match cli.command {
        Command::Start => match worker.resume().await? {
            LifecycleState::Uninstalled => print_json(&worker.start().await?),
            LifecycleState::Installed => print_json(&worker.activate().await?),
            state => {
                tracing::info!(generation = %worker.cache_name(), %state, "already running");
                Ok(())
            }
        },
        Command::Install => print_json(&worker.install().await?),
        Command::Activate => match worker.resume().await? {
            LifecycleState::Installed => print_json(&worker.activate().await?),
            LifecycleState::Active => {
                tracing::info!(generation = %worker.cache_name(), "already active");
                Ok(())
            }
            state => bail!("{} is {state}; run `shellcache install` first", worker.cache_name()),
        },
        Command::Fetch { url, method, navigate, headers } => {
            worker.resume().await?;
            let headers = headers.iter().map(|h| parse_header(h)).collect::<Result<Vec<_>>>()?;
            let navigate = navigate.then_some(true);
            let origin = config.origin_url()?;
            let request = InterceptedRequest::parse(&method, &url, &headers, navigate, Some(&origin))?;

            let (decision, response) = worker.respond(None, &request).await?;
            eprintln!("{decision} {} {}", response.status.as_u16(), response.url);
            std::io::stdout().write_all(&response.body)?;
            Ok(())
        }
        Command::Generations => Ok(()),
    }
}
