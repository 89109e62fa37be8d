mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// iClood CLI - back up photos and videos to a self-hosted iClood server
#[derive(Parser)]
#[command(name = "iclood", version)]
#[command(about = "Back up photos and videos to a self-hosted iClood server", long_about = None)]
pub struct Cli {
    /// Settings database path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Media library root (defaults to the pictures directory)
    #[arg(long, global = true)]
    library: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Configure the backup server
    Setup {
        /// Server IPv4 address
        address: String,

        /// Server port
        #[arg(long, default_value = iclood_core::settings::DEFAULT_PORT)]
        port: String,
    },

    /// Show the server connection state
    Status,

    /// Show or change backup settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// List media that still needs a backup
    Scan {
        /// Items per library page
        #[arg(
            long,
            default_value_t = iclood_core::backup::DEFAULT_PAGE_SIZE,
            value_parser = parse_min_one
        )]
        page_size: usize,

        /// Load every page instead of only the first
        #[arg(long)]
        all: bool,
    },

    /// Upload new media to the server
    Backup {
        /// Items per library page
        #[arg(
            long,
            default_value_t = iclood_core::backup::DEFAULT_PAGE_SIZE,
            value_parser = parse_min_one
        )]
        page_size: usize,

        /// Back up only these asset ids
        #[arg(long, num_args = 1..)]
        only: Vec<String>,

        /// Leave these asset ids out
        #[arg(long, num_args = 1..)]
        exclude: Vec<String>,
    },

    /// Never back up these assets
    Ignore {
        /// Asset ids, as printed by `scan`
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Show server storage usage and backup totals
    Storage,

    /// Show recent backups
    History {
        /// Number of entries
        #[arg(long, default_value_t = iclood_core::storage::DEFAULT_HISTORY_LIMIT)]
        limit: u32,
    },
}

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print the current settings
    Show,

    /// Change one or more settings
    Set {
        #[arg(long)]
        auto_backup: Option<bool>,

        #[arg(long)]
        wifi_only: Option<bool>,

        #[arg(long)]
        charging_only: Option<bool>,

        /// Storage warning threshold in percent
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
        storage_limit: Option<u8>,

        #[arg(long)]
        original_quality: Option<bool>,

        #[arg(long)]
        background_refresh: Option<bool>,

        /// Background refresh interval in minutes
        #[arg(long)]
        refresh_interval: Option<u32>,
    },

    /// Restore default settings
    Reset,
}

fn parse_min_one(s: &str) -> Result<usize, String> {
    let n: usize = s.parse().map_err(|e| format!("{e}"))?;
    if n == 0 {
        return Err("value must be at least 1".into());
    }
    Ok(n)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .with_target(false)
        .init();

    commands::run(cli).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_must_be_positive() {
        assert!(Cli::try_parse_from(["iclood", "scan", "--page-size", "0"]).is_err());
        assert!(Cli::try_parse_from(["iclood", "backup", "--page-size", "0"]).is_err());

        let cli = Cli::try_parse_from(["iclood", "scan", "--page-size", "5"]).unwrap();
        assert!(matches!(cli.command, Commands::Scan { page_size: 5, .. }));
    }
}
