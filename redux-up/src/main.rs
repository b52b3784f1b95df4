//! redux-up - drag-and-drop upload widget for the Redux processing service
//!
//! `serve` hosts the drop-zone page locally; `upload` runs one headless
//! select → upload → result cycle for a file on disk.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use redux_common::config::{CliOverrides, Settings, SettingsResolver};
use redux_common::EventBus;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

use redux_up::headless;
use redux_up::transfer::HttpTransferClient;
use redux_up::{build_router, AppState, SessionConfig, UploadSession};

/// Command-line arguments for redux-up
#[derive(Parser, Debug)]
#[command(name = "redux-up")]
#[command(about = "Upload audio or PNG files to the Redux processing service")]
#[command(version)]
struct Cli {
    /// Config file (defaults to <config dir>/redux/redux-up.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the upload page
    Serve {
        /// Address to listen on
        #[arg(short, long)]
        bind: Option<String>,

        /// Also write processed files to the output directory
        #[arg(long)]
        save: bool,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Upload one file and save the processed result
    Upload {
        /// File to upload (.wav or .png)
        file: PathBuf,

        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Remote processing endpoint
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Directory for processed files
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Total request timeout in seconds (0 disables)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Safety-net release delay for results, in seconds
    #[arg(long)]
    release_after_secs: Option<u64>,
}

impl CommonArgs {
    fn overrides(&self, bind: Option<String>) -> CliOverrides {
        CliOverrides {
            endpoint: self.endpoint.clone(),
            bind,
            output_dir: self.output_dir.clone(),
            request_timeout_secs: self.timeout_secs,
            release_after_secs: self.release_after_secs,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging comes up first so config diagnostics are visible; the filter is
    // swapped for the configured level once settings are resolved.
    let env_filter = EnvFilter::try_from_default_env().ok();
    let from_env = env_filter.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| default_filter("info")));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let resolver = match &cli.config {
        Some(path) => SettingsResolver::with_config_path(path),
        None => SettingsResolver::new(),
    };
    let overrides = match &cli.command {
        Command::Serve { bind, common, .. } => common.overrides(bind.clone()),
        Command::Upload { common, .. } => common.overrides(None),
    };
    let settings = resolver.resolve(&overrides);

    if !from_env {
        if let Err(e) = filter_handle.reload(default_filter(&settings.log_level)) {
            warn!("Failed to apply log level {}: {}", settings.log_level, e);
        }
    }

    info!(
        "Starting redux-up v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match resolver.config_path() {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("Config file: none"),
    }

    match cli.command {
        Command::Serve { save, .. } => serve(settings, save).await,
        Command::Upload { file, .. } => upload_once(settings, file).await,
    }
}

fn default_filter(level: &str) -> EnvFilter {
    EnvFilter::new(format!(
        "redux_up={0},redux_common={0},tower_http=info",
        level
    ))
}

fn build_session(settings: &Settings, save_results: bool) -> Result<UploadSession> {
    let client = HttpTransferClient::new(settings.endpoint.clone(), settings.request_timeout)
        .context("Failed to create transfer client")?;
    info!("Endpoint: {}", client.endpoint());

    let config = SessionConfig {
        output_dir: save_results.then(|| settings.output_dir.clone()),
        release_after: settings.release_after,
    };

    Ok(UploadSession::new(Arc::new(client), EventBus::new(256), config))
}

async fn serve(settings: Settings, save_results: bool) -> Result<()> {
    let session = build_session(&settings, save_results)?;
    if let Some(dir) = &session.config().output_dir {
        info!("Saving results to {}", dir.display());
    }

    let state = AppState::new(session.clone(), settings.max_upload_bytes);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&settings.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", settings.bind))?;
    info!("redux-up listening on http://{}", settings.bind);
    info!("Health check: http://{}/health", settings.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    session.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}

async fn upload_once(settings: Settings, file: PathBuf) -> Result<()> {
    let session = build_session(&settings, true)?;

    match headless::run(&session, &file).await {
        Ok(report) => {
            if let Some(metadata) = report.metadata {
                println!("{}", metadata);
            }
            Ok(())
        }
        Err(e) => {
            error!("{} ({}): {}", e.status_message(), file.display(), e);
            bail!(e.status_message())
        }
    }
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
            Ok(mut sig) => {
                sig.recv().await;
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
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
