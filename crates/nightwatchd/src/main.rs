//! nightwatchd - The nightwatch service
//!
//! Wires together:
//! - Configuration loading
//! - Store initialization
//! - Policy engine
//! - Parent notifier
//! - HTTP server

use anyhow::{Context, Result};
use clap::Parser;
use nightwatch_config::{NotifyConfig, Settings, load_config_or_default};
use nightwatch_core::{EngineSettings, PolicyEngine};
use nightwatch_http::AppState;
use nightwatch_notify::{LogNotifier, Notifier, WebhookNotifier};
use nightwatch_store::{SqliteStore, Store};
use nightwatch_util::{DATABASE_FILENAME, default_config_path, is_mock_time_active};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// nightwatchd - Device policy service for parental phone controls
#[derive(Parser, Debug)]
#[command(name = "nightwatchd")]
#[command(about = "Device policy service for parental phone controls", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/nightwatch/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Listen address override (or set NIGHTWATCH_LISTEN env var)
    #[arg(long, env = "NIGHTWATCH_LISTEN")]
    listen: Option<SocketAddr>,

    /// Data directory override (or set NIGHTWATCH_DATA_DIR env var)
    #[arg(short, long, env = "NIGHTWATCH_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Main service state
struct Service {
    listen: SocketAddr,
    state: AppState,
}

impl Service {
    fn new(args: &Args) -> Result<Self> {
        let settings: Settings = load_config_or_default(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;
        let service = &settings.service;

        info!(
            config_path = %args.config.display(),
            default_timezone = %service.default_timezone,
            "Configuration loaded"
        );

        let listen = args.listen.unwrap_or(service.listen);
        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| service.data_dir.clone());

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = data_dir.join(DATABASE_FILENAME);
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Store initialized");

        if service.admin_token.is_none() {
            warn!("No admin token configured; the parent surface only accepts parent sessions");
        }

        let notifier = build_notifier(service.notify.as_ref())?;
        info!(notifier = notifier.name(), "Notifier initialized");

        let engine = PolicyEngine::new(store, EngineSettings::from_config(service));

        Ok(Self {
            listen,
            state: AppState::new(Arc::new(engine), notifier),
        })
    }

    async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(self.listen)
            .await
            .with_context(|| format!("Failed to bind {}", self.listen))?;

        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;

        let shutdown = async move {
            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
                _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully"),
            }
        };

        info!("Service running");
        nightwatch_http::serve(listener, self.state, shutdown)
            .await
            .context("HTTP server failed")?;

        info!("Service stopped");
        Ok(())
    }
}

fn build_notifier(config: Option<&NotifyConfig>) -> Result<Arc<dyn Notifier>> {
    match config {
        Some(notify) => {
            let webhook = WebhookNotifier::new(notify.webhook_url.clone(), notify.timeout)
                .context("Failed to create webhook notifier")?;
            info!(url = %webhook.url(), "Webhook notifications enabled");
            Ok(Arc::new(webhook))
        }
        None => Ok(Arc::new(LogNotifier)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "nightwatchd starting");

    if is_mock_time_active() {
        warn!("Mock time is active; the service clock is shifted");
    }

    let service = Service::new(&args)?;
    service.run().await
}
