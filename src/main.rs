#![forbid(unsafe_code)]

//! `pod-migrate-agent` is the node agent serving migration requests.
//!
//! Bootstraps configuration, loads the pod manifest (with hot reload),
//! and serves `GET /migrate/{uid}` until SIGINT/SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use pod_migrate::checkpoint::command::CommandPreparer;
use pod_migrate::config::GlobalConfig;
use pod_migrate::migration::SessionStore;
use pod_migrate::pods::registry::PodRegistry;
use pod_migrate::pods::watcher::ManifestWatcher;
use pod_migrate::server::{self, AppState};
use pod_migrate::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "pod-migrate-agent", about = "Pod live-migration node agent", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the configured listen port.
    #[arg(long)]
    port: Option<u16>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("pod-migrate-agent bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = GlobalConfig::load_from_path(&args.config)?;
    if let Some(port) = args.port {
        config.http_port = port;
    }
    let checkpoint = config.checkpoint.clone().ok_or_else(|| {
        AppError::Config("[checkpoint] section is required to run the agent".into())
    })?;
    let config = Arc::new(config);
    info!(root_dir = %config.root_dir.display(), "configuration loaded");

    // ── Pod registry ────────────────────────────────────
    let registry = Arc::new(PodRegistry::new());
    let _watcher = match &config.pods_manifest {
        Some(manifest) => Some(ManifestWatcher::start(manifest, Arc::clone(&registry))?),
        None => {
            warn!("no pods_manifest configured; every migration request will answer 404");
            None
        }
    };

    // ── Build shared application state ──────────────────
    let state = Arc::new(AppState {
        config: Arc::clone(&config),
        pods: registry,
        preparer: Arc::new(CommandPreparer::new(checkpoint, &config.timeouts)),
        sessions: SessionStore::new(),
    });

    // ── Serve ───────────────────────────────────────────
    let ct = CancellationToken::new();
    let server_ct = ct.clone();
    let server_state = Arc::clone(&state);
    let mut server_handle =
        tokio::spawn(async move { server::serve(server_state, server_ct).await });

    info!("migration agent ready");

    tokio::select! {
        signal = shutdown_signal() => {
            info!(signal, in_flight = state.sessions.len(), "shutdown signal received");
            ct.cancel();
        }
        joined = &mut server_handle => {
            return joined.map_err(|err| AppError::Io(format!("server task failed: {err}")))?;
        }
    }

    server_handle
        .await
        .map_err(|err| AppError::Io(format!("server task failed: {err}")))??;
    info!("pod-migrate-agent shut down");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM, naming the signal received.
async fn shutdown_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => tokio::select! {
                _ = tokio::signal::ctrl_c() => "SIGINT",
                _ = sigterm.recv() => "SIGTERM",
            },
            Err(err) => {
                warn!(%err, "SIGTERM handler unavailable, waiting for ctrl-c only");
                let _ = tokio::signal::ctrl_c().await;
                "SIGINT"
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
        "ctrl-c"
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter).with_writer(std::io::stderr);

    let installed = match log_format {
        LogFormat::Text => subscriber.try_init(),
        LogFormat::Json => subscriber.json().flatten_event(true).try_init(),
    };
    installed.map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))
}
