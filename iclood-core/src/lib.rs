//! iClood Backup Client Core Library
//!
//! This library provides the core functionality for the iClood backup client:
//! server connection state, media discovery, selection and the sequential
//! upload workflow against a self-hosted iClood server.

pub mod backup;
pub mod client;
pub mod connection;
pub mod database;
pub mod device;
pub mod format;
pub mod media;
pub mod platform;
pub mod scheduler;
pub mod settings;
pub mod storage;

pub use backup::{
    BackupEvent, BackupOrchestrator, BackupProgress, BackupStats, BackupSummary, CancelToken,
    Enumeration, OrchestratorPhase,
};
pub use client::BackupClient;
pub use connection::{normalize_server_url, ConnectionManager};
pub use device::DeviceIdentity;
pub use media::{DirectoryLibrary, MediaAsset, MediaKind, MediaLibrary, PermissionStatus};
pub use platform::{ensure_data_dir, get_data_dir, get_default_database_path, get_platform};
pub use settings::{Settings, SettingsPatch, SettingsStore, SqliteSettingsStore};

use thiserror::Error;

/// Result type for backup client operations
pub type Result<T> = std::result::Result<T, IcloodError>;

/// General error type for backup client operations
#[derive(Error, Debug)]
pub enum IcloodError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Failed to persist settings: {0}")]
    Persistence(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Media library permission denied")]
    PermissionDenied,

    #[error("Server is not reachable")]
    ServerUnreachable,

    #[error("No assets selected for backup")]
    NothingSelected,

    #[error("A backup is already in progress")]
    BackupInProgress,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status} for {endpoint}")]
    ServerStatus { endpoint: String, status: u16 },

    #[error("Server rejected {endpoint}: {message}")]
    ServerRejected { endpoint: String, message: String },

    #[error("Invalid {endpoint} response: {message}")]
    Parse { endpoint: String, message: String },

    #[error("Media library error: {0}")]
    Library(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
