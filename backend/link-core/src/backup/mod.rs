//! Backup export and restore import.
//!
//! Exports are zipped under [`EXPORT_ENTRY_NAME`]. Imports look for
//! [`IMPORT_ENTRY_NAME`] first, which is what deployed peers send, and fall
//! back to [`EXPORT_ENTRY_NAME`] so an exported archive can be restored
//! as is.

pub(crate) mod archive;
pub(crate) mod payload;

use crate::error::backup::BackupError;
use crate::store::BackupStore;

use common::ErrorLocation;

use std::panic::Location;
use std::sync::Arc;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Archive entry written by exports.
pub const EXPORT_ENTRY_NAME: &str = "backup";

/// Archive entry read by imports.
pub const IMPORT_ENTRY_NAME: &str = "zip";

/// Which database an export dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DbExportKind {
    PrimaryData,
    LogData,
}

impl DbExportKind {
    /// Numeric code used on the wire.
    pub const fn code(&self) -> u8 {
        match self {
            DbExportKind::PrimaryData => 0,
            DbExportKind::LogData => 1,
        }
    }

    /// Read the kind from a `backup_db` request payload.
    ///
    /// Accepts the wire codes `0`/`1` and the names `"data"`/`"logs"`.
    #[track_caller]
    pub fn from_payload(payload: &Value) -> Result<Self, BackupError> {
        let kind = match payload {
            Value::Number(number) => match number.as_u64() {
                Some(0) => Some(DbExportKind::PrimaryData),
                Some(1) => Some(DbExportKind::LogData),
                _ => None,
            },
            Value::String(name) => match name.as_str() {
                "data" => Some(DbExportKind::PrimaryData),
                "logs" => Some(DbExportKind::LogData),
                _ => None,
            },
            _ => None,
        };

        kind.ok_or_else(|| BackupError::InvalidInput {
            message: format!("Unknown database type: {payload}"),
            location: ErrorLocation::from(Location::caller()),
        })
    }
}

/// Moves database dumps in and out of transfer archives.
#[derive(Clone)]
pub struct BackupPipeline {
    store: Arc<dyn BackupStore>,
}

impl BackupPipeline {
    pub fn new(store: Arc<dyn BackupStore>) -> Self {
        Self { store }
    }

    /// Export the `kind` database as a zip archive.
    ///
    /// # Errors
    ///
    /// - [`BackupError::Export`] if the store cannot produce the dump
    /// - [`BackupError::Archive`] if packaging fails
    pub async fn export_backup(&self, kind: DbExportKind) -> Result<Vec<u8>, BackupError> {
        debug!("Exporting {kind:?} backup");

        let dump = match kind {
            DbExportKind::PrimaryData => self.store.export_data_backup().await,
            DbExportKind::LogData => self.store.export_log_backup().await,
        }
        .map_err(|e| BackupError::Export {
            message: e.message().to_string(),
            location: ErrorLocation::from(Location::caller()),
            source: e,
        })?;

        let archive = archive::pack(EXPORT_ENTRY_NAME, &dump)?;

        info!(
            "Exported {kind:?} backup: {} bytes dumped, {} bytes archived",
            dump.len(),
            archive.len()
        );
        Ok(archive)
    }

    /// Restore from an inbound `upload_db` payload.
    ///
    /// # Errors
    ///
    /// - [`BackupError::InvalidInput`] if the payload is empty (checked before
    ///   any parsing) or not byte-shaped
    /// - [`BackupError::Archive`] if it is not a zip with a usable entry
    /// - [`BackupError::Import`] if the store rejects the dump
    pub async fn import_backup(&self, payload: &Value) -> Result<(), BackupError> {
        if payload::is_empty(payload) {
            return Err(BackupError::InvalidInput {
                message: "Backup payload is empty".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let archive = payload::coerce_bytes(payload)?;
        self.import_archive(&archive).await
    }

    /// Restore from raw archive bytes.
    pub async fn import_archive(&self, archive: &[u8]) -> Result<(), BackupError> {
        if archive.is_empty() {
            return Err(BackupError::InvalidInput {
                message: "Backup archive is empty".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let entry = archive::unpack(archive, &[IMPORT_ENTRY_NAME, EXPORT_ENTRY_NAME])?;
        let dump = payload::text_to_bytes(&entry);
        let size = dump.len();

        self.store
            .import_backup(dump)
            .await
            .map_err(|e| BackupError::Import {
                message: e.message().to_string(),
                location: ErrorLocation::from(Location::caller()),
                source: e,
            })?;

        info!("Imported backup of {size} bytes");
        Ok(())
    }
}
