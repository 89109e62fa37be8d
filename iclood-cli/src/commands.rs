//! Subcommand implementations.

use crate::{Cli, Commands, SettingsAction};
use anyhow::{bail, Context, Result};
use iclood_core::format::{format_file_size, format_timestamp};
use iclood_core::platform::get_default_library_dir;
use iclood_core::settings::{validate_port, validate_server_address};
use iclood_core::storage::{fetch_storage_report, storage_warning, WarningLevel};
use iclood_core::{
    ensure_data_dir, get_default_database_path, BackupEvent, BackupOrchestrator, BackupClient,
    ConnectionManager, DirectoryLibrary, Enumeration, MediaAsset, Settings, SettingsPatch,
    SqliteSettingsStore,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

type Orchestrator = BackupOrchestrator<DirectoryLibrary>;

pub async fn run(cli: Cli) -> Result<()> {
    let db_path = match cli.db {
        Some(path) => path,
        None => {
            ensure_data_dir().context("Failed to create data directory")?;
            get_default_database_path()
        }
    };
    debug!("Using settings database {:?}", db_path);

    let store = Arc::new(
        SqliteSettingsStore::open(&db_path)
            .with_context(|| format!("Failed to open settings database {:?}", db_path))?,
    );
    let device = store.device_identity()?;
    let connection = Arc::new(ConnectionManager::new(store, device)?);
    if let Err(e) = connection.load().await {
        warn!("Using default settings: {}", e);
    }

    let library_root = cli.library.unwrap_or_else(get_default_library_dir);
    let orchestrator = BackupOrchestrator::new(connection.clone(), DirectoryLibrary::new(library_root));

    match cli.command {
        Commands::Setup { address, port } => setup(&connection, address, port).await,
        Commands::Status => status(&connection).await,
        Commands::Settings { action } => settings(&connection, action).await,
        Commands::Scan { page_size, all } => scan(&orchestrator, page_size, all).await,
        Commands::Backup {
            page_size,
            only,
            exclude,
        } => backup(&orchestrator, page_size, only, exclude).await,
        Commands::Ignore { ids } => ignore(&orchestrator, ids).await,
        Commands::Storage => storage(&connection).await,
        Commands::History { limit } => history(&connection, limit).await,
    }
}

async fn setup(connection: &ConnectionManager, address: String, port: String) -> Result<()> {
    validate_server_address(&address)?;
    validate_port(&port)?;

    let result = connection
        .update(SettingsPatch::endpoint(address.trim(), port.trim()))
        .await;
    if let Err(e) = result {
        warn!("{}", e);
    }

    let url = connection.base_url().unwrap_or_default();
    if connection.is_reachable() {
        println!("Connected to {}", url);
    } else {
        println!("Saved {}, but the server did not answer.", url);
        println!("Check that the server is running and reachable from this device.");
    }
    Ok(())
}

async fn status(connection: &ConnectionManager) -> Result<()> {
    let device = connection.device();
    println!("Device:  {} ({})", device.device_name, device.wire_id());

    match connection.base_url() {
        None => println!("Server:  not configured (run `iclood setup <address>`)"),
        Some(url) => {
            let state = if connection.check_reachable().await {
                "reachable"
            } else {
                "unreachable"
            };
            println!("Server:  {} [{}]", url, state);
        }
    }
    Ok(())
}

async fn settings(connection: &ConnectionManager, action: SettingsAction) -> Result<()> {
    match action {
        SettingsAction::Show => {}
        SettingsAction::Reset => {
            connection.reset().await?;
            println!("Settings restored to defaults.");
        }
        SettingsAction::Set {
            auto_backup,
            wifi_only,
            charging_only,
            storage_limit,
            original_quality,
            background_refresh,
            refresh_interval,
        } => {
            let patch = SettingsPatch {
                auto_backup,
                wifi_only_backup: wifi_only,
                charging_only_backup: charging_only,
                storage_limit,
                original_quality,
                background_refresh,
                refresh_interval_minutes: refresh_interval,
                ..SettingsPatch::default()
            };
            if patch.is_empty() {
                bail!("Nothing to change; pass at least one option");
            }
            connection.update(patch).await?;
        }
    }

    print_settings(&connection.settings());
    Ok(())
}

fn print_settings(settings: &Settings) {
    let address = if settings.server_address.is_empty() {
        "(not set)"
    } else {
        settings.server_address.as_str()
    };
    println!("Server address:      {}", address);
    println!("Server port:         {}", settings.server_port);
    println!("Auto backup:         {}", settings.auto_backup);
    println!("Wi-Fi only:          {}", settings.wifi_only_backup);
    println!("Charging only:       {}", settings.charging_only_backup);
    println!("Storage limit:       {}%", settings.storage_limit);
    println!("Original quality:    {}", settings.original_quality);
    println!("Background refresh:  {}", settings.background_refresh);
    println!("Refresh interval:    {} min", settings.refresh_interval_minutes);
}

async fn scan(orchestrator: &Orchestrator, page_size: usize, all: bool) -> Result<()> {
    let connection = orchestrator.connection();
    if connection.base_url().is_some() && !connection.check_reachable().await {
        println!("Server unreachable; listing every item in the library.");
    }

    report_enumeration(orchestrator.enumerate(page_size, None).await)?;
    if all {
        while let Some(result) = orchestrator.load_more().await {
            report_enumeration(result)?;
        }
    }

    let candidates = orchestrator.candidates().await;
    for asset in &candidates {
        print_asset(asset);
    }
    println!("{} items need a backup.", candidates.len());
    if orchestrator.has_next_page().await {
        println!("More items available; pass --all to list everything.");
    }
    Ok(())
}

async fn backup(
    orchestrator: &Orchestrator,
    page_size: usize,
    only: Vec<String>,
    exclude: Vec<String>,
) -> Result<()> {
    if !orchestrator.connection().check_reachable().await {
        bail!("Server is not reachable. Check the server settings with `iclood status`.");
    }

    report_enumeration(orchestrator.enumerate(page_size, None).await)?;
    if !only.is_empty() {
        load_until_found(orchestrator, &only).await?;
        orchestrator.deselect_all().await;
        for id in &only {
            if orchestrator.toggle_selection(id).await.is_none() {
                warn!("{} is not a pending item", id);
            }
        }
    }
    for id in &exclude {
        if orchestrator.toggle_selection(id).await == Some(true) {
            orchestrator.toggle_selection(id).await;
        }
    }

    let token = orchestrator.cancel_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCanceling after the current file...");
            token.cancel();
        }
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_event(&event);
        }
    });

    let result = orchestrator.start_backup(Some(tx)).await;
    interrupt.abort();
    let _ = printer.await;

    let summary = result?;
    println!("{}", summary.message());
    if summary.failed_count > 0 {
        bail!("{} files failed to upload", summary.failed_count);
    }
    Ok(())
}

async fn ignore(orchestrator: &Orchestrator, ids: Vec<String>) -> Result<()> {
    if !orchestrator.connection().check_reachable().await {
        bail!("Server is not reachable; ignored items are recorded on the server.");
    }

    report_enumeration(orchestrator.enumerate(iclood_core::backup::DEFAULT_PAGE_SIZE, None).await)?;
    load_until_found(orchestrator, &ids).await?;

    let removed = orchestrator.ignore(&ids).await;
    if removed == 0 {
        bail!("No pending items matched the given ids");
    }
    println!("Ignored {} items.", removed);
    Ok(())
}

async fn storage(connection: &ConnectionManager) -> Result<()> {
    let client = reachable_client(connection).await?;
    let report = fetch_storage_report(&client, iclood_core::storage::DEFAULT_HISTORY_LIMIT).await?;

    let usage = &report.usage;
    println!(
        "Disk:     {} of {} used ({:.1}%), {} free",
        format_file_size(usage.used_bytes),
        format_file_size(usage.total_bytes),
        usage.used_percent(),
        format_file_size(usage.available_bytes)
    );
    if let Some(warning) = storage_warning(usage, connection.settings().storage_limit) {
        let label = match warning.level {
            WarningLevel::Warning => "Warning",
            WarningLevel::Error => "Critical",
        };
        println!("{}: {}", label, warning.message);
    }

    let stats = &report.stats;
    println!(
        "Backups:  {} files ({} photos, {} videos), {}",
        stats.total_files,
        stats.photos_count,
        stats.videos_count,
        format_file_size(stats.total_size)
    );
    if let Some(last) = &stats.last_backup_time {
        println!("Last:     {}", format_timestamp(last));
    }

    if !report.history.is_empty() {
        println!();
        print_history(&report.history);
    }
    Ok(())
}

async fn history(connection: &ConnectionManager, limit: u32) -> Result<()> {
    let client = reachable_client(connection).await?;
    let records = client.backup_history(limit).await?;
    if records.is_empty() {
        println!("No backups yet.");
    } else {
        print_history(&records);
    }
    Ok(())
}

// --- Helpers ---

async fn reachable_client(connection: &ConnectionManager) -> Result<BackupClient> {
    let client = connection
        .client()
        .context("No server configured; run `iclood setup <address>` first")?;
    if !connection.check_reachable().await {
        bail!("Server {} is not reachable", client.base_url());
    }
    Ok(client)
}

/// Load further pages until every id in `ids` is a candidate or the library is exhausted.
async fn load_until_found(orchestrator: &Orchestrator, ids: &[String]) -> Result<()> {
    loop {
        let known: HashSet<String> = orchestrator
            .candidates()
            .await
            .into_iter()
            .map(|a| a.id)
            .collect();
        if ids.iter().all(|id| known.contains(id)) {
            return Ok(());
        }
        match orchestrator.load_more().await {
            Some(result) => report_enumeration(result)?,
            None => return Ok(()),
        }
    }
}

fn report_enumeration(result: Enumeration) -> Result<()> {
    match result {
        Enumeration::Loaded {
            server_filtered, ..
        } => {
            if !server_filtered {
                debug!("Server did not filter this page");
            }
            Ok(())
        }
        Enumeration::PermissionDenied => {
            bail!("Permission denied: cannot read the media library")
        }
        Enumeration::Failed(message) => bail!("Failed to load media: {}", message),
    }
}

fn print_asset(asset: &MediaAsset) {
    println!(
        "{}  {:<5}  {:>10}  {}",
        asset.id,
        asset.kind.as_str(),
        format_file_size(asset.file_size),
        asset.filename
    );
}

fn print_event(event: &BackupEvent) {
    match event {
        BackupEvent::Started { total_files } => println!("Backing up {} files", total_files),
        BackupEvent::FileStarted(progress) => println!(
            "[{}/{}] {}% {}",
            progress.current_file,
            progress.total_files,
            progress.percentage,
            progress.current_file_name
        ),
        BackupEvent::FileFinished {
            file_name, outcome, ..
        } => {
            if !outcome.is_success() {
                println!("  failed: {} ({:?})", file_name, outcome);
            }
        }
        BackupEvent::Canceled { remaining } => {
            println!("Canceled; {} files not attempted", remaining)
        }
        BackupEvent::Finished(_) => {}
    }
}

fn print_history(records: &[iclood_core::client::BackupRecord]) {
    println!("Recent backups:");
    for record in records {
        println!(
            "  {}  {:<5}  {:>10}  {}",
            format_timestamp(&record.timestamp),
            record.file_type,
            format_file_size(record.file_size),
            record.file_name
        );
    }
}
