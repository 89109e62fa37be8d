//! Server storage report: disk usage, backup totals and recent history.

use crate::backup::BackupStats;
use crate::client::{BackupClient, BackupRecord, StorageUsage};
use crate::Result;
use serde::Serialize;
use tracing::warn;

/// Number of history entries shown by default.
pub const DEFAULT_HISTORY_LIMIT: u32 = 10;

/// Usage at or above this percentage is reported as an error.
pub const CRITICAL_USAGE_PERCENT: f64 = 90.0;

/// Everything shown on the storage screen.
#[derive(Debug, Clone, Serialize)]
pub struct StorageReport {
    pub usage: StorageUsage,
    pub stats: BackupStats,
    pub history: Vec<BackupRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WarningLevel {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageWarning {
    pub message: String,
    pub level: WarningLevel,
}

/// Fetch usage, totals and history concurrently.
///
/// Any failing request fails the whole report.
pub async fn fetch_storage_report(client: &BackupClient, history_limit: u32) -> Result<StorageReport> {
    let (usage, status, history) = tokio::join!(
        client.storage_usage(),
        client.storage_status(),
        client.backup_history(history_limit),
    );

    let report = StorageReport {
        usage: usage?,
        stats: status?.backups.into(),
        history: history.map_err(|e| {
            warn!("Failed to fetch backup history: {}", e);
            e
        })?,
    };
    Ok(report)
}

/// Warning for disk usage at or above `storage_limit` percent.
pub fn storage_warning(usage: &StorageUsage, storage_limit: u8) -> Option<StorageWarning> {
    let used = usage.used_percent();
    if used < f64::from(storage_limit) {
        return None;
    }

    Some(StorageWarning {
        message: format!(
            "Storage usage is at {:.1}%. Consider freeing up space.",
            used
        ),
        level: if used >= CRITICAL_USAGE_PERCENT {
            WarningLevel::Error
        } else {
            WarningLevel::Warning
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(used: u64, total: u64) -> StorageUsage {
        StorageUsage {
            used_bytes: used,
            total_bytes: total,
            available_bytes: total - used,
        }
    }

    #[test]
    fn below_limit_has_no_warning() {
        assert_eq!(storage_warning(&usage(50, 100), 80), None);
    }

    #[test]
    fn at_limit_warns() {
        let warning = storage_warning(&usage(80, 100), 80).unwrap();
        assert_eq!(warning.level, WarningLevel::Warning);
        assert_eq!(
            warning.message,
            "Storage usage is at 80.0%. Consider freeing up space."
        );
    }

    #[test]
    fn critical_usage_is_an_error() {
        let warning = storage_warning(&usage(925, 1000), 80).unwrap();
        assert_eq!(warning.level, WarningLevel::Error);
        assert!(warning.message.contains("92.5%"));
    }

    #[test]
    fn default_limit_only_warns_when_nearly_full() {
        assert_eq!(storage_warning(&usage(95, 100), 99), None);
        assert!(storage_warning(&usage(995, 1000), 99).is_some());
    }

    #[test]
    fn empty_disk_never_warns() {
        assert_eq!(storage_warning(&usage(0, 0), 1), None);
    }
}
