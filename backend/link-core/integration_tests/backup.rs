use crate::helpers::{
    FailingStore, MemoryStore, TEST_WAIT, accept_control_point, server_address, start_peer_server,
};

use link_core::backup::{BackupPipeline, DbExportKind, EXPORT_ENTRY_NAME, IMPORT_ENTRY_NAME};
use link_core::error::{BackupError, StoreError};
use link_core::session::{ConnectTarget, SessionManager, SessionSettings};
use link_core::store::{BackupStore, FileBackupStore};

use std::io::{Cursor, Write};
use std::sync::Arc;

use serde_json::{Value, json};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

const DATA_DUMP: &[u8] = b"INSERT INTO sites VALUES (1, 'North Plant');";
const LOG_DUMP: &[u8] = b"2026-10-16 boot ok";

fn zip_with_entry(name: &str, content: &[u8]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer.start_file(name, SimpleFileOptions::default()).unwrap();
    writer.write_all(content).unwrap();
    writer.finish().unwrap().into_inner()
}

/// **VALUE**: Verifies an export restores to the same content.
///
/// **WHY THIS MATTERS**: A backup that cannot be restored byte for byte is not a
/// backup. Exports write one entry name and imports read another, so this
/// checks the two halves agree.
///
/// **BUG THIS CATCHES**: Would catch:
/// - Import failing on archives produced by export
/// - Content altered by the text round trip for single-byte content
#[tokio::test]
async fn given_exported_backup_when_imported_then_store_receives_same_content() {
    // GIVEN: A pipeline over an in-memory store
    let store = Arc::new(MemoryStore::new(DATA_DUMP, LOG_DUMP));
    let pipeline = BackupPipeline::new(store.clone());

    // WHEN: Exporting each kind and importing the archives back
    let data = pipeline.export_backup(DbExportKind::PrimaryData).await.unwrap();
    let logs = pipeline.export_backup(DbExportKind::LogData).await.unwrap();
    pipeline.import_archive(&data).await.unwrap();
    pipeline.import_archive(&logs).await.unwrap();

    // THEN: The store got back exactly what it exported
    assert_eq!(store.imported(), vec![DATA_DUMP.to_vec(), LOG_DUMP.to_vec()]);
}

/// **VALUE**: Verifies the JSON byte array an answer carries can be uploaded back as is.
#[tokio::test]
async fn given_export_as_json_array_when_imported_as_payload_then_restored() {
    let store = Arc::new(MemoryStore::new(DATA_DUMP, LOG_DUMP));
    let pipeline = BackupPipeline::new(store.clone());
    let archive = pipeline.export_backup(DbExportKind::PrimaryData).await.unwrap();

    pipeline.import_backup(&json!(archive)).await.unwrap();

    assert_eq!(store.imported(), vec![DATA_DUMP.to_vec()]);
}

/// **VALUE**: Verifies imports prefer the `zip` entry when both names exist.
///
/// **BUG THIS CATCHES**: Would catch reading the export entry first, which
/// restores the wrong content from device-built archives.
#[tokio::test]
async fn given_archive_with_import_entry_when_imported_then_that_entry_used() {
    let store = Arc::new(MemoryStore::default());
    let pipeline = BackupPipeline::new(store.clone());

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer.start_file(EXPORT_ENTRY_NAME, SimpleFileOptions::default()).unwrap();
    writer.write_all(b"stale").unwrap();
    writer.start_file(IMPORT_ENTRY_NAME, SimpleFileOptions::default()).unwrap();
    writer.write_all(b"fresh").unwrap();
    let archive = writer.finish().unwrap().into_inner();

    pipeline.import_archive(&archive).await.unwrap();

    assert_eq!(store.imported(), vec![b"fresh".to_vec()]);
}

/// **VALUE**: Verifies a failing export is an error value, not a panic.
///
/// **WHY THIS MATTERS**: The answer to `backup_db` must carry the store's
/// message so the operator sees why the export failed.
#[tokio::test]
async fn given_failing_store_when_exporting_then_export_error_with_store_message() {
    let pipeline = BackupPipeline::new(Arc::new(FailingStore));

    let result = pipeline.export_backup(DbExportKind::PrimaryData).await;

    match result {
        Err(error @ BackupError::Export { .. }) => {
            assert_eq!(error.answer_message(), "database is locked");
        }
        other => panic!("Expected export error, got {other:?}"),
    }
}

/// **VALUE**: Verifies a store refusing the import yields an import error.
#[tokio::test]
async fn given_failing_store_when_importing_then_import_error() {
    let pipeline = BackupPipeline::new(Arc::new(FailingStore));

    let result = pipeline.import_archive(&zip_with_entry(IMPORT_ENTRY_NAME, b"x")).await;

    assert!(matches!(result, Err(BackupError::Import { .. })));
}

/// **VALUE**: Verifies empty payloads are refused before any parsing.
///
/// **BUG THIS CATCHES**: Would catch empty uploads reaching the zip reader
/// (confusing archive errors) or the store (wiping the database).
#[tokio::test]
async fn given_empty_payloads_when_imported_then_invalid_input_and_store_untouched() {
    let store = Arc::new(MemoryStore::default());
    let pipeline = BackupPipeline::new(store.clone());

    for payload in [json!(null), json!(false), json!(0), json!(""), json!([]), json!({})] {
        let result = pipeline.import_backup(&payload).await;
        assert!(
            matches!(result, Err(BackupError::InvalidInput { .. })),
            "{payload} should be refused, got {result:?}"
        );
    }
    assert!(store.imported().is_empty());
}

/// **VALUE**: Verifies bytes that are not a zip are an archive error.
#[tokio::test]
async fn given_non_zip_payload_when_imported_then_archive_error() {
    let pipeline = BackupPipeline::new(Arc::new(MemoryStore::default()));

    let result = pipeline.import_backup(&json!([1, 2, 3, 4])).await;

    assert!(matches!(result, Err(BackupError::Archive { .. })));
}

/// **VALUE**: Verifies the export kind is read from both wire spellings.
#[test]
fn given_wire_values_when_kind_parsed_then_matching_kind() {
    assert_eq!(DbExportKind::from_payload(&json!(0)).unwrap(), DbExportKind::PrimaryData);
    assert_eq!(DbExportKind::from_payload(&json!(1)).unwrap(), DbExportKind::LogData);
    assert_eq!(DbExportKind::from_payload(&json!("logs")).unwrap(), DbExportKind::LogData);
    assert!(DbExportKind::from_payload(&json!(2)).is_err());
    assert!(DbExportKind::from_payload(&Value::Null).is_err());
}

/// **VALUE**: Verifies `backup_db` then `upload_db` over a live session.
///
/// **WHY THIS MATTERS**: This is the device's full backup/restore flow.
///
/// **BUG THIS CATCHES**: Would catch an answer payload shape the device
/// cannot send back as an upload.
#[tokio::test]
async fn given_live_session_when_backup_then_upload_then_store_restored() {
    // GIVEN: A control point with an in-memory store, attached to a device
    let server = start_peer_server().await;
    let store = Arc::new(MemoryStore::new(DATA_DUMP, LOG_DUMP));
    let manager = SessionManager::new(SessionSettings::default(), store.clone());
    manager
        .connect(ConnectTarget::Direct(server_address(&server)))
        .await
        .unwrap();
    let peer = accept_control_point(&server).await;

    // WHEN: The device pulls a log backup and pushes it back
    let backup = peer.request("backup_db", json!(1), TEST_WAIT).await.unwrap();
    assert!(backup.is_success());
    let archive = backup.into_data().unwrap();
    let upload = peer.request("upload_db", archive, TEST_WAIT).await.unwrap();

    // THEN: The upload succeeded and the store got the log dump
    assert!(upload.is_success());
    assert_eq!(store.imported(), vec![LOG_DUMP.to_vec()]);
}

/// **VALUE**: Verifies an empty upload over a live session is a failed answer.
#[tokio::test]
async fn given_live_session_when_empty_upload_then_failure_answer() {
    let server = start_peer_server().await;
    let manager = SessionManager::new(SessionSettings::default(), Arc::new(MemoryStore::default()));
    manager
        .connect(ConnectTarget::Direct(server_address(&server)))
        .await
        .unwrap();
    let peer = accept_control_point(&server).await;

    let upload = peer.request("upload_db", json!([]), TEST_WAIT).await.unwrap();

    assert!(!upload.is_success());
    assert_eq!(upload.data(), None);
}

/// **VALUE**: Verifies the file store reads exports and writes imports.
#[tokio::test]
async fn given_file_store_when_exporting_and_importing_then_files_used() {
    let dir = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("data.db");
    let import_path = dir.path().join("restored.db");
    std::fs::write(&data_path, DATA_DUMP).unwrap();
    let store = FileBackupStore::new(Some(data_path), None, Some(import_path.clone()));

    let exported = store.export_data_backup().await.unwrap();
    store.import_backup(b"restored".to_vec()).await.unwrap();

    assert_eq!(exported, DATA_DUMP.to_vec());
    assert_eq!(std::fs::read(import_path).unwrap(), b"restored".to_vec());
}

/// **VALUE**: Verifies an unconfigured path makes the operation unavailable.
#[tokio::test]
async fn given_file_store_without_log_path_when_exporting_logs_then_unavailable() {
    let store = FileBackupStore::default();

    let result = store.export_log_backup().await;

    assert!(matches!(result, Err(StoreError::Unavailable { .. })));
}

/// **VALUE**: Verifies a missing export file surfaces as an IO error with its path.
#[tokio::test]
async fn given_missing_export_file_when_exporting_then_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.db");
    let store = FileBackupStore::new(Some(missing.clone()), None, None);

    let result = store.export_data_backup().await;

    match result {
        Err(StoreError::Io { path, .. }) => assert_eq!(path, missing),
        other => panic!("Expected IO error, got {other:?}"),
    }
}

/// **VALUE**: Verifies an unknown export kind is answered as a failure naming it.
#[tokio::test]
async fn given_live_session_when_unknown_kind_requested_then_failure_answer() {
    let server = start_peer_server().await;
    let manager = SessionManager::new(SessionSettings::default(), Arc::new(MemoryStore::default()));
    manager
        .connect(ConnectTarget::Direct(server_address(&server)))
        .await
        .unwrap();
    let peer = accept_control_point(&server).await;

    let backup = peer.request("backup_db", json!("everything"), TEST_WAIT).await.unwrap();

    assert!(!backup.is_success());
    assert!(backup.error().unwrap().contains("Unknown database type"));
}
