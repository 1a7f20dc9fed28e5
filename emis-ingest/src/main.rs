//! emis-ingest - Emissions Ingest Microservice
//!
//! Accepts emissions spreadsheets over HTTP, previews how each row maps onto
//! the canonical record set, and commits accepted rows under an explicit
//! duplicate policy.
//!
//! Configuration priority: CLI → environment → TOML file → compiled defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use emis_common::config::{self, SuggesterConfig, SuggesterKind};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use emis_ingest::services::{ColumnSuggester, HeuristicSuggester, NoopSuggester, RemoteSuggester};
use emis_ingest::AppState;

const CONFIG_FILE_NAME: &str = "emis-ingest.toml";
const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5730;

/// Command-line arguments for emis-ingest
#[derive(Parser, Debug)]
#[command(name = "emis-ingest")]
#[command(about = "Emissions spreadsheet ingest microservice")]
#[command(version)]
struct Args {
    /// TOML config file (defaults to the platform config directory)
    #[arg(short, long, env = "EMIS_CONFIG")]
    config: Option<PathBuf>,

    /// Folder holding the database
    #[arg(short, long, env = "EMIS_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Address to bind
    #[arg(short, long, env = "EMIS_BIND_ADDRESS")]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "EMIS_INGEST_PORT")]
    port: Option<u16>,
}

fn build_suggester(config: &SuggesterConfig) -> Result<Arc<dyn ColumnSuggester>> {
    let suggester: Arc<dyn ColumnSuggester> = match config.kind {
        SuggesterKind::Heuristic => Arc::new(HeuristicSuggester),
        SuggesterKind::None => Arc::new(NoopSuggester),
        SuggesterKind::Remote => {
            let url = config
                .url
                .clone()
                .context("suggester.url is required when suggester.kind = \"remote\"")?;
            Arc::new(
                RemoteSuggester::new(url, Duration::from_millis(config.timeout_ms))
                    .context("Failed to build remote suggester client")?,
            )
        }
    };
    Ok(suggester)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = config::load_or_default(args.config.as_deref(), CONFIG_FILE_NAME)
        .context("Failed to load configuration")?;
    toml_config.validate().context("Invalid configuration")?;

    // RUST_LOG overrides the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "emis_ingest={level},emis_common={level},tower_http={level}",
                    level = toml_config.logging.level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting emis-ingest v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = config::resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    let db_path = config::database_path(&root_folder);
    info!("Root folder: {}", root_folder.display());

    let db_pool = emis_common::db::init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let suggester = build_suggester(&toml_config.suggester)?;
    info!(suggester = suggester.name(), "Column suggester configured");

    let state = AppState::new(db_pool, toml_config.ingest.clone(), suggester);
    let app = emis_ingest::build_router(state);

    let bind = args
        .bind
        .or_else(|| toml_config.bind_address.clone())
        .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());
    let port = args.port.or(toml_config.port).unwrap_or(DEFAULT_PORT);
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
