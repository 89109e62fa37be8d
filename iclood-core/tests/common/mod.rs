//! In-process fake of the backup server and a scripted media library.

#![allow(dead_code)]

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use iclood_core::media::{LibraryEntry, LibraryPage, MediaKind, MediaLibrary, PermissionStatus};
use iclood_core::settings::MemorySettingsStore;
use iclood_core::{
    BackupOrchestrator, ConnectionManager, DeviceIdentity, IcloodError, SettingsPatch,
};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub type UploadHook = Box<dyn Fn(usize) + Send + Sync>;

/// How the fake server answers.
pub struct Script {
    pub ping_status: u16,
    pub ping_delay: Duration,
    /// Ids reported new by `/photos/new`; `None` means every id not uploaded yet.
    pub new_ids: Option<HashSet<String>>,
    pub ignored_ids: HashSet<String>,
    pub new_files_status: u16,
    pub ignore_status: u16,
    /// File names whose upload answers 500.
    pub failing_uploads: HashSet<String>,
    pub upload_delay: Duration,
    /// Called with the number of uploads received so far, before responding.
    pub on_upload: Option<UploadHook>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            ping_status: 200,
            ping_delay: Duration::ZERO,
            new_ids: None,
            ignored_ids: HashSet::new(),
            new_files_status: 200,
            ignore_status: 200,
            failing_uploads: HashSet::new(),
            upload_delay: Duration::ZERO,
            on_upload: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReceivedUpload {
    pub file_name: String,
    pub original_path: String,
    pub file_type: String,
    pub device_id: String,
    pub size: usize,
}

#[derive(Default)]
pub struct FakeState {
    pub script: Mutex<Script>,
    hits: Mutex<HashMap<&'static str, usize>>,
    uploads: Mutex<Vec<ReceivedUpload>>,
    ignore_requests: Mutex<Vec<Vec<String>>>,
}

impl FakeState {
    fn hit(&self, endpoint: &'static str) {
        *self.hits.lock().unwrap().entry(endpoint).or_insert(0) += 1;
    }
}

pub struct FakeServer {
    pub addr: SocketAddr,
    pub state: Arc<FakeState>,
}

impl FakeServer {
    pub async fn start() -> Self {
        Self::with_script(Script::default()).await
    }

    pub async fn with_script(script: Script) -> Self {
        let state = Arc::new(FakeState {
            script: Mutex::new(script),
            ..FakeState::default()
        });

        let app = Router::new()
            .route("/ping", get(ping))
            .route("/photos/new", post(new_files))
            .route("/photos/upload", post(upload))
            .route("/photos/ignore", post(ignore))
            .route("/storage/status", get(storage_status))
            .route("/backup/history", get(history))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn port(&self) -> String {
        self.addr.port().to_string()
    }

    pub fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.state.script.lock().unwrap()
    }

    pub fn count(&self, endpoint: &str) -> usize {
        self.state.hits.lock().unwrap().get(endpoint).copied().unwrap_or(0)
    }

    pub fn total_requests(&self) -> usize {
        self.state.hits.lock().unwrap().values().sum()
    }

    pub fn uploads(&self) -> Vec<ReceivedUpload> {
        self.state.uploads.lock().unwrap().clone()
    }

    pub fn uploaded_names(&self) -> Vec<String> {
        self.uploads().into_iter().map(|u| u.file_name).collect()
    }

    pub fn ignore_requests(&self) -> Vec<Vec<String>> {
        self.state.ignore_requests.lock().unwrap().clone()
    }
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap()
}

async fn ping(State(state): State<Arc<FakeState>>) -> (StatusCode, Json<Value>) {
    state.hit("/ping");
    let (code, delay) = {
        let script = state.script.lock().unwrap();
        (script.ping_status, script.ping_delay)
    };
    tokio::time::sleep(delay).await;
    (status(code), Json(json!({ "status": "success" })))
}

async fn new_files(
    State(state): State<Arc<FakeState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.hit("/photos/new");
    let uploaded: HashSet<String> = state
        .uploads
        .lock()
        .unwrap()
        .iter()
        .map(|u| u.original_path.clone())
        .collect();
    let script = state.script.lock().unwrap();
    if script.new_files_status != 200 {
        return (
            status(script.new_files_status),
            Json(json!({ "status": "error", "message": "scripted failure" })),
        );
    }

    let files = body["files"].as_array().cloned().unwrap_or_default();
    let mut new = Vec::new();
    let mut ignored = Vec::new();
    for file in &files {
        let id = file["id"].as_str().unwrap_or_default().to_string();
        let path = file["path"].as_str().unwrap_or_default();
        let is_new = match &script.new_ids {
            Some(ids) => ids.contains(&id),
            None => !uploaded.contains(path),
        };
        if script.ignored_ids.contains(&id) {
            ignored.push(json!({ "id": id }));
        }
        if is_new {
            new.push(json!({ "id": id }));
        }
    }

    (
        StatusCode::OK,
        Json(json!({ "status": "success", "new_files": new, "ignored_files": ignored })),
    )
}

async fn upload(State(state): State<Arc<FakeState>>, mut multipart: Multipart) -> StatusCode {
    state.hit("/photos/upload");

    let mut received = ReceivedUpload {
        file_name: String::new(),
        original_path: String::new(),
        file_type: String::new(),
        device_id: String::new(),
        size: 0,
    };
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                received.file_name = field.file_name().unwrap_or_default().to_string();
                received.size = field.bytes().await.unwrap().len();
            }
            "original_path" => received.original_path = field.text().await.unwrap(),
            "file_type" => received.file_type = field.text().await.unwrap(),
            "device_id" => received.device_id = field.text().await.unwrap(),
            _ => {}
        }
    }

    let delay = state.script.lock().unwrap().upload_delay;
    tokio::time::sleep(delay).await;

    let failing = state
        .script
        .lock()
        .unwrap()
        .failing_uploads
        .contains(&received.file_name);
    let count = {
        let mut uploads = state.uploads.lock().unwrap();
        if !failing {
            uploads.push(received);
        }
        uploads.len()
    };

    if let Some(hook) = &state.script.lock().unwrap().on_upload {
        hook(count);
    }

    if failing {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}

async fn ignore(
    State(state): State<Arc<FakeState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.hit("/photos/ignore");
    let code = state.script.lock().unwrap().ignore_status;
    if code != 200 {
        return (
            status(code),
            Json(json!({ "status": "error", "message": "scripted failure" })),
        );
    }
    let ids: Vec<String> = body["files"]
        .as_array()
        .map(|files| {
            files
                .iter()
                .filter_map(|f| f["id"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    let count = ids.len();
    state.ignore_requests.lock().unwrap().push(ids);
    (
        StatusCode::OK,
        Json(json!({ "status": "success", "ignored_count": count })),
    )
}

async fn storage_status(State(state): State<Arc<FakeState>>) -> Json<Value> {
    state.hit("/storage/status");
    let uploads = state.uploads.lock().unwrap();
    let size: usize = uploads.iter().map(|u| u.size).sum();
    let videos = uploads.iter().filter(|u| u.file_type == "video").count();
    Json(json!({
        "status": "success",
        "storage": { "total_bytes": 1000, "used_bytes": 950, "free_bytes": 50 },
        "backups": {
            "total_count": uploads.len(),
            "total_size_bytes": size,
            "photo_count": uploads.len() - videos,
            "video_count": videos,
            "last_backup": "2024-05-01T13:45:00"
        }
    }))
}

async fn history(State(state): State<Arc<FakeState>>) -> Json<Value> {
    state.hit("/backup/history");
    let uploads = state.uploads.lock().unwrap();
    let history: Vec<Value> = uploads
        .iter()
        .rev()
        .enumerate()
        .map(|(i, u)| {
            json!({
                "id": i + 1,
                "file_name": u.file_name,
                "file_size": u.size,
                "file_type": u.file_type,
                "timestamp": "2024-05-01T13:45:00"
            })
        })
        .collect();
    Json(json!({ "status": "success", "history": history }))
}

/// Media library with fixed ids ("A", "B", ...) backed by real files.
pub struct FakeLibrary {
    pub dir: tempfile::TempDir,
    entries: Vec<LibraryEntry>,
    permission: PermissionStatus,
    /// Claim another page on every listing without handing out a cursor.
    pub open_ended: bool,
}

impl FakeLibrary {
    /// One `<id>.jpg` file per id, listed in the given order.
    pub fn with_ids(ids: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let entries = ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let path = dir.path().join(format!("{id}.jpg"));
                std::fs::write(&path, format!("image {id}")).unwrap();
                LibraryEntry {
                    id: id.to_string(),
                    uri: format!("file://{}", path.display()),
                    filename: format!("{id}.jpg"),
                    file_size: format!("image {id}").len() as u64,
                    creation_time: 1_700_000_000_000 - i as i64,
                    modification_time: 1_700_000_000_000 - i as i64,
                    kind: MediaKind::Photo,
                    duration: None,
                    width: 10,
                    height: 10,
                }
            })
            .collect();

        Self {
            dir,
            entries,
            permission: PermissionStatus::Granted,
            open_ended: false,
        }
    }

    pub fn denied() -> Self {
        Self {
            permission: PermissionStatus::Denied,
            ..Self::with_ids(&[])
        }
    }

    pub fn path_of(&self, id: &str) -> PathBuf {
        self.dir.path().join(format!("{id}.jpg"))
    }
}

impl MediaLibrary for FakeLibrary {
    async fn request_permission(&self) -> PermissionStatus {
        self.permission
    }

    async fn list_assets(
        &self,
        page_size: usize,
        after: Option<&str>,
    ) -> iclood_core::Result<LibraryPage> {
        let start = match after {
            Some(cursor) => {
                self.entries
                    .iter()
                    .position(|e| e.id == cursor)
                    .ok_or_else(|| IcloodError::Library(format!("unknown cursor {cursor}")))?
                    + 1
            }
            None => 0,
        };
        let entries: Vec<_> = self.entries.iter().skip(start).take(page_size).cloned().collect();
        if self.open_ended {
            return Ok(LibraryPage {
                entries,
                has_next_page: true,
                end_cursor: None,
            });
        }
        Ok(LibraryPage {
            has_next_page: start + entries.len() < self.entries.len(),
            end_cursor: entries.last().map(|e| e.id.clone()),
            entries,
        })
    }

    async fn resolve_local_path(&self, entry: &LibraryEntry) -> iclood_core::Result<PathBuf> {
        entry
            .uri
            .strip_prefix("file://")
            .map(PathBuf::from)
            .ok_or_else(|| IcloodError::Library(entry.uri.clone()))
    }
}

pub fn manager(probe_timeout: Duration) -> Arc<ConnectionManager> {
    let store = Arc::new(MemorySettingsStore::new());
    Arc::new(
        ConnectionManager::new(store, DeviceIdentity::generate("test-device"))
            .unwrap()
            .with_probe_timeout(probe_timeout),
    )
}

/// Connection manager pointed at `server`; probes once via `update`.
pub async fn connect(server: &FakeServer) -> Arc<ConnectionManager> {
    let connection = manager(Duration::from_millis(500));
    connection
        .update(SettingsPatch::endpoint("127.0.0.1", server.port()))
        .await
        .unwrap();
    connection
}

pub async fn orchestrator(
    server: &FakeServer,
    library: FakeLibrary,
) -> Arc<BackupOrchestrator<FakeLibrary>> {
    let connection = connect(server).await;
    Arc::new(BackupOrchestrator::new(connection, library))
}

pub fn ids(assets: &[iclood_core::MediaAsset]) -> Vec<String> {
    assets.iter().map(|a| a.id.clone()).collect()
}
