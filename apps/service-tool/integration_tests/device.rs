use link_core::LOOPBACK_ADDRESS;
use link_core::backup::DbExportKind;
use link_core::error::StoreError;
use link_core::peer::PeerServer;
use link_core::session::{ConnectTarget, PeerInfo, SessionManager, SessionSettings};
use link_core::store::{BackupStore, FileBackupStore};

use service_tool::commands::{ServeOptions, drive_control_point};
use service_tool::error::ServiceToolError;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

// ============================================================================
// Integration tests: the serve command driving a real control point session
// ============================================================================

const ANSWER_TIMEOUT: Duration = Duration::from_secs(5);

struct LockedStore;

#[async_trait]
impl BackupStore for LockedStore {
    async fn export_data_backup(&self) -> Result<Vec<u8>, StoreError> {
        Err(StoreError::other("database is locked"))
    }

    async fn export_log_backup(&self) -> Result<Vec<u8>, StoreError> {
        Err(StoreError::other("database is locked"))
    }

    async fn import_backup(&self, _data: Vec<u8>) -> Result<(), StoreError> {
        Err(StoreError::other("database is locked"))
    }
}

fn options(bind: &str) -> ServeOptions {
    ServeOptions {
        bind: bind.to_string(),
        answer_timeout: ANSWER_TIMEOUT,
        backup: None,
        output: None,
        restore: None,
    }
}

async fn attach(
    server: &PeerServer,
    store: Arc<dyn BackupStore>,
    target: ConnectTarget,
) -> SessionManager {
    let settings = SessionSettings {
        port: server.local_addr().port(),
        channel_timeout: Duration::from_millis(500),
        local_address: Some("127.0.0.90".to_string()),
    };
    let manager = SessionManager::new(settings, store);
    manager.connect(target).await.expect("Control point failed to connect");
    manager
}

/// **VALUE**: Verifies the serve sequence pulls a backup and pushes a restore.
///
/// **WHY THIS MATTERS**: This is the bench test an operator runs against a
/// control point before going to site: identity, export, restore.
///
/// **BUG THIS CATCHES**: Would catch:
/// - The serve side decoding the backup answer in the wrong shape
/// - Restores sent in a shape the control point cannot import
/// - The backup file not written where asked
#[tokio::test]
async fn given_file_store_control_point_when_driven_then_backup_written_and_restored() {
    // GIVEN: A control point with file-backed dumps, found by discovery
    let dir = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("data.db");
    let import_path = dir.path().join("imported.db");
    let output = dir.path().join("backup.zip");
    std::fs::write(&data_path, b"CREATE TABLE points (id INTEGER);").unwrap();
    let store = Arc::new(FileBackupStore::new(
        Some(data_path),
        None,
        Some(import_path.clone()),
    ));

    let server = PeerServer::bind(&format!("{LOOPBACK_ADDRESS}:0")).await.unwrap();
    let _manager = attach(
        &server,
        store,
        ConnectTarget::Discover(PeerInfo::new("CP-11", "Harbor")),
    )
    .await;
    let connection = server.next_control_point().await.unwrap();

    // WHEN: Driving it with a data backup and a restore of that same backup
    let mut serve_options = options(&server.local_addr().to_string());
    serve_options.backup = Some(DbExportKind::PrimaryData);
    serve_options.output = Some(output.clone());
    serve_options.restore = Some(output.clone());
    let report = drive_control_point(&connection, &serve_options).await.unwrap();

    // THEN: Identity reported, archive written, dump restored unchanged
    assert_eq!(report.peer_info, Some(PeerInfo::new("CP-11", "Harbor")));
    assert_eq!(std::fs::read(&output).unwrap(), report.backup.unwrap());
    assert!(report.restored);
    assert_eq!(
        std::fs::read(import_path).unwrap(),
        b"CREATE TABLE points (id INTEGER);".to_vec()
    );
}

/// **VALUE**: Verifies a failing export stops the sequence with the control point's reason.
#[tokio::test]
async fn given_locked_store_when_backup_requested_then_request_failed() {
    let server = PeerServer::bind(&format!("{LOOPBACK_ADDRESS}:0")).await.unwrap();
    let _manager = attach(
        &server,
        Arc::new(LockedStore),
        ConnectTarget::Direct(server.local_addr().to_string()),
    )
    .await;
    let connection = server.next_control_point().await.unwrap();
    let mut serve_options = options(&server.local_addr().to_string());
    serve_options.backup = Some(DbExportKind::LogData);

    let result = drive_control_point(&connection, &serve_options).await;

    match result {
        Err(ServiceToolError::RequestFailed { message, .. }) => {
            assert!(message.contains("database is locked"), "{message}");
        }
        other => panic!("Expected RequestFailed, got {other:?}"),
    }
}

/// **VALUE**: Verifies a direct session without peer info still passes the sequence.
#[tokio::test]
async fn given_direct_session_when_driven_then_no_peer_info() {
    let server = PeerServer::bind(&format!("{LOOPBACK_ADDRESS}:0")).await.unwrap();
    let _manager = attach(
        &server,
        Arc::new(LockedStore),
        ConnectTarget::Direct(server.local_addr().to_string()),
    )
    .await;
    let connection = server.next_control_point().await.unwrap();

    let report = drive_control_point(&connection, &options("unused")).await.unwrap();

    assert_eq!(report.peer_info, None);
    assert_eq!(report.backup, None);
    assert!(!report.restored);
}
