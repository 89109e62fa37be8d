mod common;

use common::{connect, manager, FakeServer, Script};
use iclood_core::settings::SqliteSettingsStore;
use iclood_core::{ConnectionManager, Settings, SettingsPatch};
use std::sync::Arc;
use std::time::Duration;

async fn reachable_with(script: Script) -> (FakeServer, bool) {
    let server = FakeServer::with_script(script).await;
    let connection = manager(Duration::from_millis(300));
    connection
        .update(SettingsPatch::endpoint("127.0.0.1", server.port()))
        .await
        .unwrap();
    let reachable = connection.is_reachable();
    (server, reachable)
}

#[tokio::test]
async fn ping_200_is_reachable() {
    let (server, reachable) = reachable_with(Script::default()).await;
    assert!(reachable);
    assert_eq!(server.count("/ping"), 1);
}

#[tokio::test]
async fn non_200_ping_is_unreachable() {
    for code in [404, 500, 503] {
        let (server, reachable) = reachable_with(Script {
            ping_status: code,
            ..Script::default()
        })
        .await;
        assert!(!reachable, "status {code} must not count as reachable");
        assert_eq!(server.count("/ping"), 1);
    }
}

#[tokio::test]
async fn slow_ping_times_out() {
    let (_server, reachable) = reachable_with(Script {
        ping_delay: Duration::from_secs(2),
        ..Script::default()
    })
    .await;
    assert!(!reachable);
}

#[tokio::test]
async fn refused_connection_is_unreachable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let connection = manager(Duration::from_millis(300));
    connection
        .update(SettingsPatch::endpoint("127.0.0.1", port.to_string()))
        .await
        .unwrap();
    assert!(!connection.is_reachable());
}

#[tokio::test]
async fn reachability_follows_the_server() {
    let server = FakeServer::start().await;
    let connection = connect(&server).await;
    let mut rx = connection.subscribe_reachability();
    assert!(*rx.borrow_and_update());

    server.script().ping_status = 500;
    assert!(!connection.check_reachable().await);
    assert!(rx.has_changed().unwrap());
    assert!(!*rx.borrow_and_update());

    server.script().ping_status = 200;
    assert!(connection.check_reachable().await);
    assert!(connection.is_reachable());
}

#[tokio::test]
async fn only_endpoint_changes_trigger_a_probe() {
    let server = FakeServer::start().await;
    let connection = connect(&server).await;
    assert_eq!(server.count("/ping"), 1);

    connection
        .update(SettingsPatch {
            wifi_only_backup: Some(false),
            storage_limit: Some(75),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(server.count("/ping"), 1);

    // Same address and port again is not a change.
    connection
        .update(SettingsPatch::endpoint("127.0.0.1", server.port()))
        .await
        .unwrap();
    assert_eq!(server.count("/ping"), 1);
}

#[tokio::test]
async fn switching_to_a_dead_server_drops_reachability() {
    let server = FakeServer::start().await;
    let connection = connect(&server).await;
    assert!(connection.is_reachable());

    connection
        .update(SettingsPatch::endpoint("127.0.0.1", "1"))
        .await
        .unwrap();
    assert!(!connection.is_reachable());
}

#[tokio::test]
async fn settings_survive_a_restart() {
    let server = FakeServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("iclood.db");

    let device = {
        let store = Arc::new(SqliteSettingsStore::open(&db_path).unwrap());
        let device = store.device_identity().unwrap();
        let connection = ConnectionManager::new(store, device.clone()).unwrap();
        connection
            .update(SettingsPatch {
                server_address: Some("127.0.0.1".to_string()),
                server_port: Some(server.port()),
                charging_only_backup: Some(true),
                refresh_interval_minutes: Some(15),
                ..Default::default()
            })
            .await
            .unwrap();
        device
    };
    let pings_before = server.count("/ping");

    let store = Arc::new(SqliteSettingsStore::open(&db_path).unwrap());
    assert_eq!(store.device_identity().unwrap(), device);
    let connection = ConnectionManager::new(store, device).unwrap();
    connection.load().await.unwrap();

    let settings = connection.settings();
    assert_eq!(
        settings,
        Settings {
            server_address: "127.0.0.1".to_string(),
            server_port: server.port(),
            charging_only_backup: true,
            refresh_interval_minutes: 15,
            ..Settings::default()
        }
    );
    // Loading a configured address probes it.
    assert_eq!(server.count("/ping"), pings_before + 1);
    assert!(connection.is_reachable());
}
