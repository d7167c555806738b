//! flingoos-ui - Session lifecycle service
//!
//! Drives recording sessions on the bridge, runs the post-session
//! processing pipeline and streams progress over SSE.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use flingoos_common::config::{default_config_path, load_toml_config, write_toml_config};
use flingoos_common::events::{attach_observer, EventBus, LogObserver};
use flingoos_ui::config::{CliOverrides, LogFilter, ServiceConfig};
use flingoos_ui::services::{RecordingAgent, SessionController};
use flingoos_ui::AppState;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for flingoos-ui
#[derive(Parser, Debug)]
#[command(name = "flingoos-ui")]
#[command(about = "Session lifecycle service for Flingoos")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "FLINGOOS_UI_PORT")]
    port: Option<u16>,

    /// Interface to bind
    #[arg(long, env = "FLINGOOS_UI_HOST")]
    host: Option<String>,

    /// TOML config file (default: ~/.config/flingoos/webui.toml)
    #[arg(short, long, env = "FLINGOOS_CONFIG")]
    config: Option<PathBuf>,

    /// Data folder for generated trigger files
    #[arg(short, long)]
    data_folder: Option<PathBuf>,

    /// Recording agent base URL
    #[arg(long, env = "FLINGOOS_BRIDGE_URL")]
    bridge_url: Option<String>,

    /// Remote processing pipeline base URL
    #[arg(long, env = "FLINGOOS_FORGE_URL")]
    forge_url: Option<String>,

    /// Workflow result store base URL
    #[arg(long, env = "FLINGOOS_STORE_URL")]
    store_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Bootstrap filter until the configured level is known
    let (filter_layer, log_filter) = LogFilter::layer(EnvFilter::try_from_default_env().ok());
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let toml_config = load_toml_config(args.config.as_deref())
        .context("Failed to load configuration")?;

    if let Err(e) = log_filter.apply_configured(&toml_config.logging.level) {
        warn!("Could not apply configured log level: {}", e);
    }

    info!(
        "Starting flingoos-ui v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    // First run: seed the default config file (best-effort)
    if args.config.is_none() {
        if let Some(path) = default_config_path().filter(|p| !p.exists()) {
            match write_toml_config(&toml_config, &path) {
                Ok(()) => info!("Wrote default config to {}", path.display()),
                Err(e) => warn!("Could not write default config {}: {}", path.display(), e),
            }
        }
    }

    let config = ServiceConfig::resolve(
        &toml_config,
        CliOverrides {
            host: args.host,
            port: args.port,
            data_folder: args.data_folder,
            bridge_url: args.bridge_url,
            forge_url: args.forge_url,
            store_url: args.store_url,
        },
    )
    .context("Invalid configuration")?;

    info!("Data folder: {}", config.data_folder.display());
    info!("Recording agent: {}", config.bridge_url);
    info!("Processing pipeline: {}", config.forge_url);
    info!("Result store: {} (cohort {})", config.store_url, config.pipeline.cohort_key);

    let triggers_dir = config
        .prepare_triggers_dir()
        .context("Failed to initialize data folder")?;

    let agent = config
        .build_agent()
        .context("Failed to create recording agent client")?;
    let collaborators = config
        .build_collaborators(triggers_dir)
        .context("Failed to create collaborator clients")?;

    if agent.is_reachable().await {
        info!("Recording agent reachable at {}", config.bridge_url);
    } else {
        warn!(
            "Recording agent not reachable at {}; sessions cannot start until it is running",
            config.bridge_url
        );
    }

    let event_bus = EventBus::new(config.event_capacity);
    info!("Event bus initialized (capacity {})", event_bus.capacity());

    let _log_observer = attach_observer(&event_bus, LogObserver);

    let controller = SessionController::new(
        Arc::new(agent),
        Arc::new(collaborators),
        event_bus,
        config.pipeline.clone(),
    );

    let app = flingoos_ui::build_router(AppState::new(controller));

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
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
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
