//! amber-progress - Progress Graph Engine service
//!
//! Serves per-learner topic graphs over HTTP: mastery updates, prerequisite
//! unlocking, recommendations, and concept import.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use amber_common::config::{RootFolderInitializer, RootFolderResolver, TomlConfig};
use amber_common::EventBus;
use amber_progress::{build_router, AppState};

/// Command-line arguments for amber-progress
#[derive(Parser, Debug)]
#[command(name = "amber-progress")]
#[command(about = "Progress Graph Engine for AMBERLEAR")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "AMBER_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder holding amberlear.db
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Database file (overrides the root folder location)
    #[arg(short, long, env = "AMBER_DATABASE")]
    database: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "AMBER_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "AMBER_BIND_ADDRESS")]
    bind_address: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = TomlConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "amber_progress={level},amber_common={level},tower_http={level}",
                    level = config.logging.level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Log build identification before any database work
    info!(
        "Starting AMBERLEAR Progress Graph Engine (amber-progress) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let db_path = match args.database.clone().or_else(|| config.database_path.clone()) {
        Some(path) => path,
        None => {
            let root_folder = RootFolderResolver::new("amber-progress")
                .with_cli_arg(args.root_folder.clone())
                .with_toml_root(config.root_folder.clone())
                .resolve();
            let initializer = RootFolderInitializer::new(root_folder);
            info!("Root folder: {}", initializer.root_folder().display());
            initializer
                .ensure_directory_exists()
                .context("Failed to initialize root folder")?;
            initializer.database_path()
        }
    };
    info!("Database path: {}", db_path.display());

    let pool = amber_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;
    info!("Database ready");

    let event_bus = EventBus::new(config.event_capacity);
    let state = AppState::new(pool, event_bus, config.max_write_attempts);
    let app = build_router(state);

    let bind_address = args.bind_address.unwrap_or(config.bind_address);
    let port = args.port.unwrap_or(config.port);
    let addr: SocketAddr = format!("{}:{}", bind_address, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind_address, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("amber-progress listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
