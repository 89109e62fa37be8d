//! Progress, events and results of an upload run.

use serde::Serialize;

/// Snapshot of the running upload pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackupProgress {
    pub in_progress: bool,
    /// 1-based index of the file being uploaded, 0 before the first.
    pub current_file: usize,
    pub total_files: usize,
    pub current_file_name: String,
    /// 0-100, rounded.
    pub percentage: u8,
}

impl BackupProgress {
    /// Nothing running.
    pub fn idle() -> Self {
        Self::default()
    }

    /// A run of `total_files` has started but no file has been picked up yet.
    pub fn started(total_files: usize) -> Self {
        Self {
            in_progress: true,
            total_files,
            ..Self::default()
        }
    }

    /// Progress when the file at zero-based `index` starts.
    pub fn at(index: usize, total_files: usize, file_name: &str) -> Self {
        let current_file = index + 1;
        Self {
            in_progress: true,
            current_file,
            total_files,
            current_file_name: file_name.to_string(),
            percentage: percentage(current_file, total_files),
        }
    }
}

/// `round(current / total * 100)`, 0 when `total` is 0.
pub fn percentage(current: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (current as f64 / total as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

/// Server-reported backup totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackupStats {
    pub total_files: u64,
    pub total_size: u64,
    pub photos_count: u64,
    pub videos_count: u64,
    pub last_backup_time: Option<String>,
}

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Uploaded,
    /// The local file disappeared before upload.
    Missing,
    Failed(String),
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Uploaded)
    }
}

/// Events emitted by an upload run, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum BackupEvent {
    Started {
        total_files: usize,
    },
    FileStarted(BackupProgress),
    FileFinished {
        /// 1-based.
        index: usize,
        file_name: String,
        outcome: FileOutcome,
    },
    /// Cancellation observed; `remaining` files were not attempted.
    Canceled {
        remaining: usize,
    },
    Finished(BackupSummary),
}

/// Final accounting of a run: `success + failed + skipped == total`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackupSummary {
    pub total_files: usize,
    pub success_count: usize,
    pub failed_count: usize,
    /// Files never attempted because the run was canceled.
    pub skipped_count: usize,
    pub canceled: bool,
}

impl BackupSummary {
    pub fn new(total_files: usize) -> Self {
        Self {
            total_files,
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcome: &FileOutcome) {
        if outcome.is_success() {
            self.success_count += 1;
        } else {
            self.failed_count += 1;
        }
    }

    pub fn is_balanced(&self) -> bool {
        self.success_count + self.failed_count + self.skipped_count == self.total_files
    }

    /// User-facing completion notice.
    pub fn message(&self) -> String {
        let mut message = format!("Successfully backed up {} files.", self.success_count);
        if self.failed_count > 0 {
            message.push_str(&format!(" Failed to backup {} files.", self.failed_count));
        }
        if self.canceled {
            message.push_str(&format!(
                " Canceled with {} files remaining.",
                self.skipped_count
            ));
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_rounds() {
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 8), 13);
        assert_eq!(percentage(3, 3), 100);
        assert_eq!(percentage(0, 0), 0);
    }

    #[test]
    fn progress_at_index_is_one_based() {
        let progress = BackupProgress::at(0, 4, "a.jpg");
        assert!(progress.in_progress);
        assert_eq!(progress.current_file, 1);
        assert_eq!(progress.percentage, 25);
        assert_eq!(progress.current_file_name, "a.jpg");
    }

    #[test]
    fn started_and_idle() {
        let started = BackupProgress::started(7);
        assert!(started.in_progress);
        assert_eq!(started.current_file, 0);
        assert_eq!(started.percentage, 0);
        assert!(!BackupProgress::idle().in_progress);
    }

    #[test]
    fn summary_accounting_and_message() {
        let mut summary = BackupSummary::new(3);
        summary.record(&FileOutcome::Uploaded);
        summary.record(&FileOutcome::Missing);
        assert!(!summary.is_balanced());

        summary.skipped_count = 1;
        summary.canceled = true;
        assert!(summary.is_balanced());
        assert_eq!(
            summary.message(),
            "Successfully backed up 1 files. Failed to backup 1 files. Canceled with 1 files remaining."
        );
    }

    #[test]
    fn clean_run_message_has_no_failures() {
        let mut summary = BackupSummary::new(1);
        summary.record(&FileOutcome::Uploaded);
        assert_eq!(summary.message(), "Successfully backed up 1 files.");
    }
}
