//! HTTP client for communicating with the iClood backup server.

pub mod models;

pub use models::{
    BackupRecord, BackupTotals, CandidateFile, FileRef, IgnoredFile, NewFilesResponse,
    StorageUsage,
};

use crate::media::MediaAsset;
use crate::{IcloodError, Result};
use models::{
    ensure_success, parse_body, HistoryResponse, IgnoreRequest, IgnoreResponse, NewFilesRequest,
    StorageStatusResponse,
};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

/// Timeout applied to JSON endpoints. Uploads run without one.
pub const JSON_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for one iClood server, on behalf of one device.
#[derive(Clone)]
pub struct BackupClient {
    client: reqwest::Client,
    base_url: String,
    device_id: String,
}

impl BackupClient {
    /// Create a new client with its own connection pool.
    pub fn new(base_url: &str, device_id: &str) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self::with_http(client, base_url, device_id))
    }

    /// Create a client that shares an existing connection pool.
    pub fn with_http(client: reqwest::Client, base_url: &str, device_id: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            device_id: device_id.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// `GET /ping`, returning the HTTP status. Network errors and timeouts are `Err`.
    pub async fn ping(&self, timeout: Duration) -> Result<StatusCode> {
        let resp = self
            .client
            .get(self.url("/ping"))
            .header("Content-Type", "application/json")
            .timeout(timeout)
            .send()
            .await?;
        Ok(resp.status())
    }

    /// Ask the server which of `files` still need a backup.
    pub async fn check_new_files(&self, files: &[CandidateFile]) -> Result<NewFilesResponse> {
        let path = "/photos/new";
        let request = NewFilesRequest {
            device_id: &self.device_id,
            files,
        };

        let body = self.post_json(path, &request).await?;
        let response: NewFilesResponse = parse_body(path, &body)?;
        ensure_success(path, &response.status, response.message.as_deref())?;
        Ok(response)
    }

    /// Upload one local file as multipart form data.
    pub async fn upload_file(&self, asset: &MediaAsset) -> Result<()> {
        let path = "/photos/upload";
        let file = tokio::fs::File::open(&asset.path).await?;
        let length = file.metadata().await?.len();

        let part = Part::stream_with_length(reqwest::Body::from(file), length)
            .file_name(asset.filename.clone())
            .mime_str(asset.kind.upload_mime())?;
        let form = Form::new()
            .part("file", part)
            .text("original_path", asset.path.to_string_lossy().into_owned())
            .text("file_type", asset.kind.as_str())
            .text("device_id", self.device_id.clone());

        let resp = self
            .client
            .post(self.url(path))
            .multipart(form)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(IcloodError::ServerStatus {
                endpoint: path.to_string(),
                status: resp.status().as_u16(),
            });
        }
        debug!("Uploaded {} ({} bytes)", asset.filename, length);
        Ok(())
    }

    /// Record `files` as permanently ignored for this device.
    pub async fn ignore_files(&self, files: &[IgnoredFile]) -> Result<()> {
        let path = "/photos/ignore";
        let request = IgnoreRequest {
            device_id: &self.device_id,
            files,
        };

        let body = self.post_json(path, &request).await?;
        // Success is the 2xx status; the body is informational only.
        if let Ok(response) = parse_body::<IgnoreResponse>(path, &body) {
            debug!(
                "Server ignored {} files (status {:?})",
                response.ignored_count.unwrap_or(0),
                response.status
            );
        }
        Ok(())
    }

    /// Aggregate backup counts and disk usage.
    pub async fn storage_status(&self) -> Result<StorageStatusResponse> {
        let path = "/storage/status";
        let resp = self.get(path).await?;
        let body = Self::success_body(path, resp).await?;
        let response: StorageStatusResponse = parse_body(path, &body)?;
        ensure_success(path, &response.status, response.message.as_deref())?;
        Ok(response)
    }

    /// Server disk usage.
    ///
    /// Servers without `/storage/usage` report the same numbers inside
    /// `/storage/status`, which is used when the former answers 404.
    pub async fn storage_usage(&self) -> Result<StorageUsage> {
        let path = "/storage/usage";
        let resp = self.get(path).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            debug!("{} not available, falling back to /storage/status", path);
            let status = self.storage_status().await?;
            return status.storage.map(StorageUsage::from).ok_or_else(|| IcloodError::Parse {
                endpoint: "/storage/status".to_string(),
                message: "missing storage block".to_string(),
            });
        }

        let body = Self::success_body(path, resp).await?;
        parse_body(path, &body)
    }

    /// Most recent backups, newest first.
    pub async fn backup_history(&self, limit: u32) -> Result<Vec<BackupRecord>> {
        let path = format!("/backup/log?limit={}", limit);
        let mut resp = self.get(&path).await?;
        let mut endpoint = "/backup/log";
        if resp.status() == StatusCode::NOT_FOUND {
            endpoint = "/backup/history";
            resp = self.get(endpoint).await?;
        }

        let body = Self::success_body(endpoint, resp).await?;
        let response: HistoryResponse = parse_body(endpoint, &body)?;
        if let Some(status) = &response.status {
            ensure_success(endpoint, status, None)?;
        }

        let mut records = response.backups;
        records.truncate(limit as usize);
        Ok(records)
    }

    // --- Internal helpers ---

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response> {
        let resp = self
            .client
            .get(self.url(path))
            .timeout(JSON_TIMEOUT)
            .send()
            .await?;
        Ok(resp)
    }

    async fn post_json<B: serde::Serialize>(&self, path: &str, body: &B) -> Result<Vec<u8>> {
        let resp = self
            .client
            .post(self.url(path))
            .timeout(JSON_TIMEOUT)
            .json(body)
            .send()
            .await?;
        Self::success_body(path, resp).await
    }

    async fn success_body(endpoint: &str, resp: reqwest::Response) -> Result<Vec<u8>> {
        if !resp.status().is_success() {
            return Err(IcloodError::ServerStatus {
                endpoint: endpoint.to_string(),
                status: resp.status().as_u16(),
            });
        }
        Ok(resp.bytes().await?.to_vec())
    }
}
