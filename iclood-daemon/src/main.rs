//! iClood background refresh daemon
//!
//! Keeps the server reachability and backup totals current and, while the
//! backup policy allows it, uploads new media every refresh interval.

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use iclood_core::platform::get_default_library_dir;
use iclood_core::scheduler::{BackgroundRefresh, StaticConditions};
use iclood_core::{
    ensure_data_dir, get_default_database_path, BackupOrchestrator, ConnectionManager,
    DirectoryLibrary, SqliteSettingsStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "iclood-daemon", about = "iClood background backup daemon")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Media library root override
    #[arg(short, long)]
    library: Option<PathBuf>,

    /// Settings database override
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .init();

    info!("Starting iClood daemon v{}", VERSION);

    let config_path = cli.config.unwrap_or_else(config::DaemonConfig::default_path);
    let mut cfg = if config_path.exists() {
        config::DaemonConfig::load(&config_path)
            .with_context(|| format!("Failed to read {:?}", config_path))?
    } else {
        info!("No config file found, using defaults");
        config::DaemonConfig::default()
    };

    if let Some(library) = cli.library {
        cfg.library_root = Some(library);
    }
    if let Some(database) = cli.database {
        cfg.database_path = Some(database);
    }

    let db_path = match cfg.database_path.clone() {
        Some(path) => path,
        None => {
            ensure_data_dir()?;
            get_default_database_path()
        }
    };
    let store = Arc::new(SqliteSettingsStore::open(&db_path)?);
    let device = store.device_identity()?;
    let connection = Arc::new(ConnectionManager::new(store, device)?);
    if let Err(e) = connection.load().await {
        warn!("Using default settings: {}", e);
    }
    if connection.base_url().is_none() {
        warn!("No server configured yet; run `iclood setup <address>`");
    }

    let library_root = cfg.library_root.clone().unwrap_or_else(get_default_library_dir);
    info!("Watching media library at {:?}", library_root);
    let orchestrator = Arc::new(BackupOrchestrator::new(
        connection.clone(),
        DirectoryLibrary::new(library_root),
    ));

    let stats_handle = orchestrator.spawn_stats_watcher();
    let conditions = StaticConditions {
        on_wifi: cfg.assume_wifi,
        charging: cfg.assume_charging,
    };
    let refresh_handle =
        BackgroundRefresh::new(orchestrator.clone(), Arc::new(conditions), cfg.page_size).spawn();

    info!("Daemon ready. Press Ctrl+C to exit.");

    signal::ctrl_c().await?;
    info!("Received shutdown signal");

    orchestrator.cancel_backup();
    refresh_handle.abort();
    stats_handle.abort();

    Ok(())
}
