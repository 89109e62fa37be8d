//! Background refresh: periodic automatic backups gated by the backup policy.

use crate::backup::{BackupOrchestrator, BackupSummary, Enumeration};
use crate::media::MediaLibrary;
use crate::settings::Settings;
use crate::IcloodError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Network and power state of the device.
pub trait DeviceConditions: Send + Sync {
    fn on_wifi(&self) -> bool;
    fn is_charging(&self) -> bool;
}

/// Fixed conditions, for hosts that cannot observe them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticConditions {
    pub on_wifi: bool,
    pub charging: bool,
}

impl Default for StaticConditions {
    fn default() -> Self {
        Self {
            on_wifi: true,
            charging: true,
        }
    }
}

impl DeviceConditions for StaticConditions {
    fn on_wifi(&self) -> bool {
        self.on_wifi
    }

    fn is_charging(&self) -> bool {
        self.charging
    }
}

/// Why an automatic backup did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AutoBackupDisabled,
    NotOnWifi,
    NotCharging,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::AutoBackupDisabled => "auto backup is disabled",
            SkipReason::NotOnWifi => "not on Wi-Fi",
            SkipReason::NotCharging => "not charging",
        };
        f.write_str(reason)
    }
}

/// Check the backup policy toggles against the current device conditions.
pub fn auto_backup_eligibility(
    settings: &Settings,
    conditions: &dyn DeviceConditions,
) -> Result<(), SkipReason> {
    if !settings.auto_backup {
        return Err(SkipReason::AutoBackupDisabled);
    }
    if settings.wifi_only_backup && !conditions.on_wifi() {
        return Err(SkipReason::NotOnWifi);
    }
    if settings.charging_only_backup && !conditions.is_charging() {
        return Err(SkipReason::NotCharging);
    }
    Ok(())
}

/// Result of one refresh tick.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Skipped(SkipReason),
    Unreachable,
    PermissionDenied,
    NothingToBackUp,
    BackedUp(BackupSummary),
    Failed(String),
}

/// Periodically probes the server and backs up new media.
pub struct BackgroundRefresh<L> {
    orchestrator: Arc<BackupOrchestrator<L>>,
    conditions: Arc<dyn DeviceConditions>,
    page_size: usize,
}

impl<L: MediaLibrary + 'static> BackgroundRefresh<L> {
    pub fn new(
        orchestrator: Arc<BackupOrchestrator<L>>,
        conditions: Arc<dyn DeviceConditions>,
        page_size: usize,
    ) -> Self {
        Self {
            orchestrator,
            conditions,
            page_size,
        }
    }

    /// Reload settings, then probe, enumerate page one and back up
    /// whatever is selected.
    pub async fn run_once(&self) -> RefreshOutcome {
        self.reload_settings().await;
        self.refresh().await
    }

    /// Pick up changes other processes made to the shared settings store.
    async fn reload_settings(&self) {
        if let Err(e) = self.orchestrator.connection().load().await {
            warn!("Keeping previous settings: {}", e);
        }
    }

    async fn refresh(&self) -> RefreshOutcome {
        let connection = self.orchestrator.connection();
        if let Err(reason) = auto_backup_eligibility(&connection.settings(), &*self.conditions) {
            debug!("Skipping automatic backup: {}", reason);
            return RefreshOutcome::Skipped(reason);
        }

        if !connection.check_reachable().await {
            return RefreshOutcome::Unreachable;
        }

        match self.orchestrator.enumerate(self.page_size, None).await {
            Enumeration::Loaded { total: 0, .. } => return RefreshOutcome::NothingToBackUp,
            Enumeration::Loaded { .. } => {}
            Enumeration::PermissionDenied => return RefreshOutcome::PermissionDenied,
            Enumeration::Failed(message) => return RefreshOutcome::Failed(message),
        }

        match self.orchestrator.start_backup(None).await {
            Ok(summary) => RefreshOutcome::BackedUp(summary),
            Err(IcloodError::NothingSelected) => RefreshOutcome::NothingToBackUp,
            Err(IcloodError::ServerUnreachable) => RefreshOutcome::Unreachable,
            Err(e) => RefreshOutcome::Failed(e.to_string()),
        }
    }

    /// Run [`run_once`](Self::run_once) every `refresh_interval_minutes`
    /// while background refresh is enabled. Settings are reloaded from the
    /// store each tick.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                self.reload_settings().await;
                let settings = self.orchestrator.connection().settings();
                if settings.background_refresh {
                    match self.refresh().await {
                        RefreshOutcome::BackedUp(summary) => info!("{}", summary.message()),
                        RefreshOutcome::Failed(message) => {
                            error!("Background refresh failed: {}", message)
                        }
                        RefreshOutcome::PermissionDenied => {
                            warn!("Background refresh cannot read the media library")
                        }
                        other => debug!("Background refresh: {:?}", other),
                    }
                } else {
                    debug!("Background refresh disabled");
                }

                tokio::time::sleep(refresh_interval(&settings)).await;
            }
        })
    }
}

/// Tick length for the configured interval, at least one minute.
pub fn refresh_interval(settings: &Settings) -> Duration {
    Duration::from_secs(u64::from(settings.refresh_interval_minutes.max(1)) * 60)
}
