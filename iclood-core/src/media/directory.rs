//! Media library backed by a directory tree on the local file system.

use super::{LibraryEntry, LibraryPage, MediaKind, MediaLibrary, PermissionStatus};
use crate::{IcloodError, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};
use walkdir::WalkDir;

const PHOTO_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "heic", "heif", "gif", "webp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "avi", "mkv", "3gp"];

const FILE_URI_PREFIX: &str = "file://";

/// Photos and videos found under a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryLibrary {
    root: PathBuf,
}

impl DirectoryLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every media file under the root, newest first.
    fn scan(root: &Path) -> Vec<LibraryEntry> {
        let mut entries: Vec<LibraryEntry> = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable library entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| Self::describe(entry.path()))
            .collect();

        entries.sort_by(|a, b| {
            b.creation_time
                .cmp(&a.creation_time)
                .then_with(|| a.uri.cmp(&b.uri))
        });
        entries
    }

    fn describe(path: &Path) -> Option<LibraryEntry> {
        let kind = media_kind_for(path)?;
        let metadata = std::fs::metadata(path).ok()?;
        let modified = metadata.modified().ok().map(millis_since_epoch).unwrap_or(0);
        let created = metadata
            .created()
            .ok()
            .map(millis_since_epoch)
            .unwrap_or(modified);

        Some(LibraryEntry {
            id: asset_id(path),
            uri: format!("{}{}", FILE_URI_PREFIX, path.display()),
            filename: path.file_name()?.to_string_lossy().into_owned(),
            file_size: metadata.len(),
            creation_time: created,
            modification_time: modified,
            kind,
            duration: None,
            width: 0,
            height: 0,
        })
    }
}

impl MediaLibrary for DirectoryLibrary {
    async fn request_permission(&self) -> PermissionStatus {
        match tokio::fs::read_dir(&self.root).await {
            Ok(_) => PermissionStatus::Granted,
            Err(e) => {
                warn!("Cannot read media library {:?}: {}", self.root, e);
                PermissionStatus::Denied
            }
        }
    }

    async fn list_assets(&self, page_size: usize, after: Option<&str>) -> Result<LibraryPage> {
        let root = self.root.clone();

        let all = tokio::task::spawn_blocking(move || Self::scan(&root))
            .await
            .map_err(|e| IcloodError::Library(format!("library scan failed: {}", e)))?;

        let start = match after {
            Some(cursor) => {
                let (time, uri) = parse_cursor(cursor)?;
                all.partition_point(|entry| {
                    entry.creation_time > time
                        || (entry.creation_time == time && entry.uri.as_str() <= uri)
                })
            }
            None => 0,
        };

        let entries: Vec<LibraryEntry> = all.iter().skip(start).take(page_size).cloned().collect();
        let has_next_page = start + entries.len() < all.len();
        let end_cursor = entries.last().map(cursor_for);
        debug!(
            "Listed {} of {} library items from {:?}",
            entries.len(),
            all.len(),
            self.root
        );

        Ok(LibraryPage {
            entries,
            has_next_page,
            end_cursor,
        })
    }

    async fn resolve_local_path(&self, entry: &LibraryEntry) -> Result<PathBuf> {
        entry
            .uri
            .strip_prefix(FILE_URI_PREFIX)
            .map(PathBuf::from)
            .ok_or_else(|| IcloodError::Library(format!("unsupported uri {}", entry.uri)))
    }
}

/// Cursor naming the sort position of `entry`: `<creation_time>:<uri>`.
///
/// Listing resumes after that position, so the entry itself may be gone
/// by the time the next page is read.
fn cursor_for(entry: &LibraryEntry) -> String {
    format!("{}:{}", entry.creation_time, entry.uri)
}

fn parse_cursor(cursor: &str) -> Result<(i64, &str)> {
    cursor
        .split_once(':')
        .and_then(|(time, uri)| time.parse().ok().map(|time| (time, uri)))
        .ok_or_else(|| IcloodError::Library(format!("invalid cursor {}", cursor)))
}

/// Media kind from the file extension, `None` for non-media files.
pub fn media_kind_for(path: &Path) -> Option<MediaKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if PHOTO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Photo)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Video)
    } else {
        None
    }
}

/// Stable id for a file: hex of the first 16 bytes of SHA-256 over its path.
pub fn asset_id(path: &Path) -> String {
    let digest = Sha256::digest(path.to_string_lossy().as_bytes());
    hex::encode(&digest[..16])
}

fn millis_since_epoch(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
