//! Asset backup orchestration: enumerate candidates, manage the selection
//! and upload it to the server one file at a time.

pub mod cancel;
pub mod progress;
pub mod selection;

pub use cancel::CancelToken;
pub use progress::{BackupEvent, BackupProgress, BackupStats, BackupSummary, FileOutcome};
pub use selection::CandidateSet;

use crate::client::BackupClient;
use crate::connection::ConnectionManager;
use crate::media::{LibraryPage, MediaAsset, MediaLibrary, PermissionStatus};
use crate::{IcloodError, Result};
use selection::retain_new;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Page size used when none is given.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Where the orchestrator is in its enumerate/select/upload cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorPhase {
    Idle,
    Enumerating,
    /// Candidates loaded; `candidates` may be zero when nothing is new.
    Ready { candidates: usize },
    Uploading,
}

/// Result of one enumeration pass. Failures are reported here, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enumeration {
    /// Library access was refused; no candidates were produced.
    PermissionDenied,
    Loaded {
        /// Candidates added by this page.
        added: usize,
        /// Candidates held after this page.
        total: usize,
        has_next_page: bool,
        /// Whether the server filtered the page. `false` means every
        /// listed item was kept because the server could not be asked.
        server_filtered: bool,
    },
    Failed(String),
}

#[derive(Debug, Clone, Default)]
struct PageState {
    page_size: usize,
    end_cursor: Option<String>,
    has_next_page: bool,
}

/// Owns candidate assets, the selection and the upload workflow.
pub struct BackupOrchestrator<L> {
    connection: Arc<ConnectionManager>,
    library: L,
    assets: RwLock<CandidateSet>,
    paging: RwLock<PageState>,
    phase: RwLock<OrchestratorPhase>,
    progress: watch::Sender<BackupProgress>,
    stats: watch::Sender<BackupStats>,
    cancel: CancelToken,
}

impl<L: MediaLibrary> BackupOrchestrator<L> {
    pub fn new(connection: Arc<ConnectionManager>, library: L) -> Self {
        let (progress, _) = watch::channel(BackupProgress::idle());
        let (stats, _) = watch::channel(BackupStats::default());

        Self {
            connection,
            library,
            assets: RwLock::new(CandidateSet::new()),
            paging: RwLock::new(PageState {
                page_size: DEFAULT_PAGE_SIZE,
                ..PageState::default()
            }),
            phase: RwLock::new(OrchestratorPhase::Idle),
            progress,
            stats,
            cancel: CancelToken::new(),
        }
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    pub fn library(&self) -> &L {
        &self.library
    }

    pub async fn phase(&self) -> OrchestratorPhase {
        *self.phase.read().await
    }

    /// All current candidates.
    pub async fn candidates(&self) -> Vec<MediaAsset> {
        self.assets.read().await.candidates().to_vec()
    }

    /// Selected candidates, in upload order.
    pub async fn selected(&self) -> Vec<MediaAsset> {
        self.assets.read().await.selected()
    }

    /// Whether another library page can be loaded.
    pub async fn has_next_page(&self) -> bool {
        self.paging.read().await.has_next_page
    }

    pub fn progress(&self) -> BackupProgress {
        self.progress.borrow().clone()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<BackupProgress> {
        self.progress.subscribe()
    }

    pub fn stats(&self) -> BackupStats {
        self.stats.borrow().clone()
    }

    pub fn subscribe_stats(&self) -> watch::Receiver<BackupStats> {
        self.stats.subscribe()
    }

    /// Load a page of candidates from the media library.
    ///
    /// Without a cursor the page replaces the current candidates; with one
    /// it is appended. When the server is reachable it filters out items
    /// already backed up or ignored. Otherwise, or if that call fails,
    /// every listed item is kept. A page size of zero is treated as one.
    pub async fn enumerate(&self, page_size: usize, cursor: Option<String>) -> Enumeration {
        let page_size = page_size.max(1);
        {
            let mut phase = self.phase.write().await;
            if *phase == OrchestratorPhase::Uploading {
                return Enumeration::Failed(IcloodError::BackupInProgress.to_string());
            }
            *phase = OrchestratorPhase::Enumerating;
        }

        if self.library.request_permission().await == PermissionStatus::Denied {
            warn!("Media library permission denied");
            self.settle_phase(false).await;
            return Enumeration::PermissionDenied;
        }

        let page = match self.library.list_assets(page_size, cursor.as_deref()).await {
            // A page without a cursor cannot be continued.
            Ok(page) => LibraryPage {
                has_next_page: page.has_next_page && page.end_cursor.is_some(),
                ..page
            },
            Err(e) => {
                error!("Error loading assets: {}", e);
                self.settle_phase(false).await;
                return Enumeration::Failed(e.to_string());
            }
        };

        let mut assets = Vec::with_capacity(page.entries.len());
        for entry in page.entries {
            match self.library.resolve_local_path(&entry).await {
                Ok(path) => assets.push(MediaAsset::from_entry(entry, path)),
                Err(e) => warn!("Skipping {}: {}", entry.filename, e),
            }
        }

        let listed = assets.len();
        let (assets, server_filtered) = self.filter_with_server(assets).await;
        debug!(
            "Page of {} items, {} need backup (server filtered: {})",
            listed,
            assets.len(),
            server_filtered
        );

        let (added, total) = {
            let mut set = self.assets.write().await;
            let added = if cursor.is_none() {
                let count = assets.len();
                set.replace(assets);
                count
            } else {
                set.append(assets)
            };
            (added, set.len())
        };

        *self.paging.write().await = PageState {
            page_size,
            end_cursor: page.end_cursor,
            has_next_page: page.has_next_page,
        };
        self.settle_phase(true).await;

        Enumeration::Loaded {
            added,
            total,
            has_next_page: page.has_next_page,
            server_filtered,
        }
    }

    /// Load the page after the last one. `None` when there is no further page.
    pub async fn load_more(&self) -> Option<Enumeration> {
        let paging = self.paging.read().await.clone();
        if !paging.has_next_page {
            return None;
        }
        Some(self.enumerate(paging.page_size, paging.end_cursor).await)
    }

    /// Flip the selection of one candidate. `None` if the id is unknown.
    pub async fn toggle_selection(&self, id: &str) -> Option<bool> {
        self.assets.write().await.toggle(id)
    }

    pub async fn select_all(&self) {
        self.assets.write().await.select_all();
    }

    pub async fn deselect_all(&self) {
        self.assets.write().await.deselect_all();
    }

    /// Ask the server to permanently ignore `ids` and drop them locally.
    ///
    /// No-op (returns 0, no request) for an empty id list, an unreachable
    /// server, or ids that match no candidate. Returns the number of
    /// candidates removed.
    pub async fn ignore(&self, ids: &[String]) -> usize {
        if ids.is_empty() {
            return 0;
        }
        let client = match self.reachable_client() {
            Some(client) => client,
            None => {
                debug!("Not ignoring {} assets: server unreachable", ids.len());
                return 0;
            }
        };

        let targets: Vec<_> = {
            let set = self.assets.read().await;
            set.candidates()
                .iter()
                .filter(|a| ids.contains(&a.id))
                .map(MediaAsset::to_ignored_file)
                .collect()
        };
        if targets.is_empty() {
            return 0;
        }

        match client.ignore_files(&targets).await {
            Ok(()) => {
                let removed = self.assets.write().await.remove(ids);
                self.settle_phase(true).await;
                info!("Ignored {} assets", removed);
                removed
            }
            Err(e) => {
                error!("Failed to ignore assets: {}", e);
                0
            }
        }
    }

    /// Handle that cancels the running (or next) upload loop.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Stop the upload run after the file in flight. Idempotent.
    pub fn cancel_backup(&self) {
        info!("Backup cancel requested");
        self.cancel.cancel();
    }

    /// Upload the current selection, one file at a time.
    ///
    /// Fails without side effects when the server is unreachable, nothing
    /// is selected, or a run is already going. Per-file failures are
    /// counted, never raised. Afterwards stats are refreshed and the
    /// candidates are re-enumerated from the first page.
    pub async fn start_backup(
        &self,
        events: Option<UnboundedSender<BackupEvent>>,
    ) -> Result<BackupSummary> {
        let (client, selection) = {
            let mut phase = self.phase.write().await;
            if *phase == OrchestratorPhase::Uploading {
                return Err(IcloodError::BackupInProgress);
            }
            let client = self
                .reachable_client()
                .ok_or(IcloodError::ServerUnreachable)?;
            let selection = self.assets.read().await.selected();
            if selection.is_empty() {
                return Err(IcloodError::NothingSelected);
            }
            *phase = OrchestratorPhase::Uploading;
            (client, selection)
        };

        info!("Starting backup of {} files", selection.len());
        self.cancel.reset();
        let summary = run_uploads(
            &client,
            &selection,
            &self.cancel,
            &self.progress,
            events.as_ref(),
        )
        .await;

        self.progress.send_replace(BackupProgress::idle());
        if let Err(e) = self.refresh_stats().await {
            warn!("Failed to refresh backup stats: {}", e);
        }
        info!("{}", summary.message());
        emit(events.as_ref(), BackupEvent::Finished(summary.clone()));

        self.assets.write().await.clear();
        *self.phase.write().await = OrchestratorPhase::Idle;
        let page_size = self.paging.read().await.page_size;
        self.enumerate(page_size, None).await;

        Ok(summary)
    }

    /// Fetch aggregate backup stats from the server.
    pub async fn refresh_stats(&self) -> Result<BackupStats> {
        let client = self
            .reachable_client()
            .ok_or(IcloodError::ServerUnreachable)?;
        let status = client.storage_status().await?;
        let stats: BackupStats = status.backups.into();
        self.stats.send_replace(stats.clone());
        Ok(stats)
    }

    fn reachable_client(&self) -> Option<BackupClient> {
        if !self.connection.is_reachable() {
            return None;
        }
        self.connection.client()
    }

    async fn filter_with_server(&self, assets: Vec<MediaAsset>) -> (Vec<MediaAsset>, bool) {
        if assets.is_empty() {
            return (assets, false);
        }
        let client = match self.reachable_client() {
            Some(client) => client,
            None => return (assets, false),
        };

        let files: Vec<_> = assets.iter().map(MediaAsset::to_candidate_file).collect();
        match client.check_new_files(&files).await {
            Ok(response) => (retain_new(assets, &response), true),
            Err(e) => {
                warn!("Failed to check new files, keeping all: {}", e);
                (assets, false)
            }
        }
    }

    /// Leave the enumerating state. `loaded` is false when no page came back.
    async fn settle_phase(&self, loaded: bool) {
        let count = self.assets.read().await.len();
        let mut phase = self.phase.write().await;
        if *phase == OrchestratorPhase::Uploading {
            return;
        }
        *phase = if loaded || count > 0 {
            OrchestratorPhase::Ready { candidates: count }
        } else {
            OrchestratorPhase::Idle
        };
    }
}

impl<L: MediaLibrary + 'static> BackupOrchestrator<L> {
    /// Refresh stats every time the server becomes reachable.
    pub fn spawn_stats_watcher(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let mut reachable = this.connection.subscribe_reachability();

        tokio::spawn(async move {
            loop {
                let is_reachable = *reachable.borrow_and_update();
                if is_reachable {
                    if let Err(e) = this.refresh_stats().await {
                        warn!("Failed to fetch backup stats: {}", e);
                    }
                }
                if reachable.changed().await.is_err() {
                    break;
                }
            }
        })
    }
}

/// Upload `assets` in order, checking `cancel` before each file.
async fn run_uploads(
    client: &BackupClient,
    assets: &[MediaAsset],
    cancel: &CancelToken,
    progress: &watch::Sender<BackupProgress>,
    events: Option<&UnboundedSender<BackupEvent>>,
) -> BackupSummary {
    let total = assets.len();
    let mut summary = BackupSummary::new(total);
    progress.send_replace(BackupProgress::started(total));
    emit(events, BackupEvent::Started { total_files: total });

    for (index, asset) in assets.iter().enumerate() {
        if cancel.is_canceled() {
            summary.canceled = true;
            summary.skipped_count = total - index;
            info!("Backup canceled, {} files not attempted", summary.skipped_count);
            emit(
                events,
                BackupEvent::Canceled {
                    remaining: summary.skipped_count,
                },
            );
            break;
        }

        let snapshot = BackupProgress::at(index, total, &asset.filename);
        progress.send_replace(snapshot.clone());
        emit(events, BackupEvent::FileStarted(snapshot));

        let outcome = upload_one(client, asset).await;
        summary.record(&outcome);
        emit(
            events,
            BackupEvent::FileFinished {
                index: index + 1,
                file_name: asset.filename.clone(),
                outcome,
            },
        );
    }

    summary
}

async fn upload_one(client: &BackupClient, asset: &MediaAsset) -> FileOutcome {
    match tokio::fs::try_exists(&asset.path).await {
        Ok(true) => {}
        Ok(false) => {
            warn!("{} no longer exists at {:?}", asset.filename, asset.path);
            return FileOutcome::Missing;
        }
        Err(e) => {
            warn!("Cannot stat {:?}: {}", asset.path, e);
            return FileOutcome::Failed(e.to_string());
        }
    }

    match client.upload_file(asset).await {
        Ok(()) => FileOutcome::Uploaded,
        Err(e) => {
            error!("Failed to upload asset {}: {}", asset.filename, e);
            FileOutcome::Failed(e.to_string())
        }
    }
}

fn emit(events: Option<&UnboundedSender<BackupEvent>>, event: BackupEvent) {
    if let Some(tx) = events {
        // A dropped receiver only means nobody is watching.
        let _ = tx.send(event);
    }
}
