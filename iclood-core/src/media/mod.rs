//! Device media library: the source of candidate photos and videos.
//!
//! Enumerating the library and prompting for access are platform concerns;
//! they sit behind [`MediaLibrary`] so the backup workflow can run against
//! a phone gallery, a directory tree or a test double alike.

pub mod directory;

pub use directory::DirectoryLibrary;

use crate::client::{CandidateFile, IgnoredFile};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;

/// Kind of media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
        }
    }

    /// MIME type sent with uploads. Derived from the kind only, not sniffed.
    pub fn upload_mime(&self) -> &'static str {
        match self {
            Self::Photo => "image/jpeg",
            Self::Video => "video/mp4",
        }
    }
}

/// Outcome of asking the user for media library access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// An item as listed by the platform, before its local path is resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryEntry {
    pub id: String,
    pub uri: String,
    pub filename: String,
    /// Size in bytes; zero when the platform does not know it.
    pub file_size: u64,
    /// Milliseconds since the Unix epoch.
    pub creation_time: i64,
    pub modification_time: i64,
    pub kind: MediaKind,
    /// Seconds, videos only.
    pub duration: Option<f64>,
    pub width: u32,
    pub height: u32,
}

/// One page of library entries, newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LibraryPage {
    pub entries: Vec<LibraryEntry>,
    pub has_next_page: bool,
    /// Cursor to pass as `after` to fetch the next page.
    pub end_cursor: Option<String>,
}

/// A device-local photo or video considered for backup.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaAsset {
    pub id: String,
    pub uri: String,
    /// Resolved local file path.
    pub path: PathBuf,
    pub filename: String,
    pub file_size: u64,
    pub creation_time: i64,
    pub modification_time: i64,
    pub kind: MediaKind,
    pub duration: Option<f64>,
    pub width: u32,
    pub height: u32,
    pub selected: bool,
    pub ignored: bool,
}

impl MediaAsset {
    /// Build a candidate from a listed entry and its resolved path. New
    /// candidates start out selected.
    pub fn from_entry(entry: LibraryEntry, path: PathBuf) -> Self {
        Self {
            id: entry.id,
            uri: entry.uri,
            path,
            filename: entry.filename,
            file_size: entry.file_size,
            creation_time: entry.creation_time,
            modification_time: entry.modification_time,
            kind: entry.kind,
            duration: entry.duration,
            width: entry.width,
            height: entry.height,
            selected: true,
            ignored: false,
        }
    }

    pub fn path_string(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    pub fn to_candidate_file(&self) -> CandidateFile {
        CandidateFile {
            id: self.id.clone(),
            path: self.path_string(),
            name: self.filename.clone(),
            size: self.file_size,
            kind: self.kind,
            created: self.creation_time,
        }
    }

    pub fn to_ignored_file(&self) -> IgnoredFile {
        IgnoredFile {
            id: self.id.clone(),
            path: self.path_string(),
            name: self.filename.clone(),
        }
    }
}

/// Access to the device's photos and videos.
pub trait MediaLibrary: Send + Sync {
    /// Ask for (or confirm) read access to the library.
    fn request_permission(&self) -> impl Future<Output = PermissionStatus> + Send;

    /// List up to `page_size` items older than the `after` cursor, or the
    /// newest items when `after` is `None`.
    fn list_assets(
        &self,
        page_size: usize,
        after: Option<&str>,
    ) -> impl Future<Output = Result<LibraryPage>> + Send;

    /// Resolve the platform URI of `entry` to a readable local file path.
    fn resolve_local_path(
        &self,
        entry: &LibraryEntry,
    ) -> impl Future<Output = Result<PathBuf>> + Send;
}
