mod common;

use common::FakeServer;
use iclood_core::client::{CandidateFile, StorageUsage};
use iclood_core::storage::{fetch_storage_report, storage_warning, WarningLevel};
use iclood_core::{BackupClient, IcloodError, MediaKind};

fn client(server: &FakeServer) -> BackupClient {
    BackupClient::new(&format!("http://{}", server.addr), "device-1").unwrap()
}

#[tokio::test]
async fn storage_usage_falls_back_to_status() {
    let server = FakeServer::start().await;
    let usage = client(&server).storage_usage().await.unwrap();
    assert_eq!(
        usage,
        StorageUsage {
            used_bytes: 950,
            total_bytes: 1000,
            available_bytes: 50,
        }
    );
    assert_eq!(server.count("/storage/status"), 1);
}

#[tokio::test]
async fn history_falls_back_and_accepts_history_key() {
    let server = FakeServer::start().await;
    let records = client(&server).backup_history(5).await.unwrap();
    assert!(records.is_empty());
    assert_eq!(server.count("/backup/history"), 1);
}

#[tokio::test]
async fn report_combines_all_three() {
    let server = FakeServer::start().await;
    let report = fetch_storage_report(&client(&server), 10).await.unwrap();

    assert_eq!(report.usage.total_bytes, 1000);
    assert_eq!(report.stats.total_files, 0);
    assert!(report.history.is_empty());

    let warning = storage_warning(&report.usage, 80).unwrap();
    assert_eq!(warning.level, WarningLevel::Error);
    assert_eq!(
        warning.message,
        "Storage usage is at 95.0%. Consider freeing up space."
    );
}

#[tokio::test]
async fn rejected_new_files_is_an_error() {
    let server = FakeServer::start().await;
    server.script().new_files_status = 400;

    let files = vec![CandidateFile {
        id: "A".to_string(),
        path: "/p/A.jpg".to_string(),
        name: "A.jpg".to_string(),
        size: 1,
        kind: MediaKind::Photo,
        created: 0,
    }];
    let result = client(&server).check_new_files(&files).await;
    assert!(matches!(
        result,
        Err(IcloodError::ServerStatus { status: 400, .. })
    ));
}

#[tokio::test]
async fn new_files_lists_unseen_ids() {
    let server = FakeServer::start().await;
    let files = vec![CandidateFile {
        id: "A".to_string(),
        path: "/p/A.jpg".to_string(),
        name: "A.jpg".to_string(),
        size: 1,
        kind: MediaKind::Video,
        created: 0,
    }];
    let response = client(&server).check_new_files(&files).await.unwrap();
    assert_eq!(response.new_files.len(), 1);
    assert!(response.ignored_files.is_empty());
}
