//! Wire format of the iClood server API.
//!
//! Every endpoint gets a declared request/response type; responses are
//! parsed at the boundary so that a malformed body becomes a typed
//! [`IcloodError::Parse`] instead of silently missing fields.

use crate::backup::BackupStats;
use crate::media::MediaKind;
use crate::{IcloodError, Result};
use serde::{Deserialize, Serialize};

/// Value of the `status` field on successful responses.
pub const STATUS_SUCCESS: &str = "success";

/// One local file offered to `/photos/new`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateFile {
    pub id: String,
    pub path: String,
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    /// Creation time, milliseconds since the Unix epoch.
    pub created: i64,
}

#[derive(Debug, Serialize)]
pub struct NewFilesRequest<'a> {
    pub device_id: &'a str,
    pub files: &'a [CandidateFile],
}

/// Reference to a file by id inside a server response. Extra fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileRef {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewFilesResponse {
    pub status: String,
    #[serde(default)]
    pub new_files: Vec<FileRef>,
    #[serde(default)]
    pub ignored_files: Vec<FileRef>,
    #[serde(default)]
    pub message: Option<String>,
}

/// One file to be marked as ignored by `/photos/ignore`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IgnoredFile {
    pub id: String,
    pub path: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct IgnoreRequest<'a> {
    pub device_id: &'a str,
    pub files: &'a [IgnoredFile],
}

#[derive(Debug, Clone, Deserialize)]
pub struct IgnoreResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub ignored_count: Option<u64>,
}

/// Aggregate counts from `/storage/status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BackupTotals {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub total_size_bytes: u64,
    #[serde(default)]
    pub photo_count: u64,
    #[serde(default)]
    pub video_count: u64,
    #[serde(default)]
    pub last_backup: Option<String>,
}

impl From<BackupTotals> for BackupStats {
    fn from(totals: BackupTotals) -> Self {
        BackupStats {
            total_files: totals.total_count,
            total_size: totals.total_size_bytes,
            photos_count: totals.photo_count,
            videos_count: totals.video_count,
            last_backup_time: totals.last_backup,
        }
    }
}

/// Disk block embedded in `/storage/status`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DiskBlock {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageStatusResponse {
    pub status: String,
    #[serde(default)]
    pub storage: Option<DiskBlock>,
    #[serde(default)]
    pub backups: BackupTotals,
    #[serde(default)]
    pub message: Option<String>,
}

/// Server disk usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageUsage {
    pub used_bytes: u64,
    pub total_bytes: u64,
    pub available_bytes: u64,
}

impl StorageUsage {
    /// Used share of the disk in percent, `0.0` for an empty disk.
    pub fn used_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.used_bytes as f64 / self.total_bytes as f64 * 100.0
    }
}

impl From<DiskBlock> for StorageUsage {
    fn from(disk: DiskBlock) -> Self {
        StorageUsage {
            used_bytes: disk.used_bytes,
            total_bytes: disk.total_bytes,
            available_bytes: disk.free_bytes,
        }
    }
}

/// One entry of the server's backup log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub id: i64,
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub timestamp: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(alias = "history")]
    pub backups: Vec<BackupRecord>,
}

/// Turn a non-success `status` field into [`IcloodError::ServerRejected`].
pub fn ensure_success(endpoint: &str, status: &str, message: Option<&str>) -> Result<()> {
    if status == STATUS_SUCCESS {
        return Ok(());
    }
    Err(IcloodError::ServerRejected {
        endpoint: endpoint.to_string(),
        message: message.unwrap_or(status).to_string(),
    })
}

/// Parse a JSON body for `endpoint`.
pub fn parse_body<T: serde::de::DeserializeOwned>(endpoint: &str, body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| IcloodError::Parse {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}
