//! Database export/import capability consumed by the backup pipeline.
//!
//! The link never looks inside a backup: a store hands out raw bytes and
//! takes raw bytes back.

use crate::error::store::StoreError;

use common::ErrorLocation;

use std::panic::Location;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::info;

#[async_trait]
pub trait BackupStore: Send + Sync {
    /// Dump of the primary data database.
    async fn export_data_backup(&self) -> Result<Vec<u8>, StoreError>;

    /// Dump of the log database.
    async fn export_log_backup(&self) -> Result<Vec<u8>, StoreError>;

    /// Replace the primary data database with `data`.
    async fn import_backup(&self, data: Vec<u8>) -> Result<(), StoreError>;
}

/// Store backed by plain files.
///
/// Exports read the configured dump files; an import writes the received
/// dump to `import_path`. Any path left unset makes that operation fail with
/// [`StoreError::Unavailable`].
#[derive(Debug, Clone, Default)]
pub struct FileBackupStore {
    data_export_path: Option<PathBuf>,
    log_export_path: Option<PathBuf>,
    import_path: Option<PathBuf>,
}

impl FileBackupStore {
    pub fn new(
        data_export_path: Option<PathBuf>,
        log_export_path: Option<PathBuf>,
        import_path: Option<PathBuf>,
    ) -> Self {
        Self {
            data_export_path,
            log_export_path,
            import_path,
        }
    }

    #[track_caller]
    fn required<'a>(path: &'a Option<PathBuf>, what: &str) -> Result<&'a Path, StoreError> {
        path.as_deref().ok_or_else(|| StoreError::Unavailable {
            message: format!("No {what} path configured"),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    async fn read(path: &Path) -> Result<Vec<u8>, StoreError> {
        tokio::fs::read(path).await.map_err(|e| StoreError::Io {
            message: format!("Failed to read backup source: {e}"),
            path: path.to_path_buf(),
            location: ErrorLocation::from(Location::caller()),
            source: e,
        })
    }
}

#[async_trait]
impl BackupStore for FileBackupStore {
    async fn export_data_backup(&self) -> Result<Vec<u8>, StoreError> {
        let path = Self::required(&self.data_export_path, "data export")?;
        Self::read(path).await
    }

    async fn export_log_backup(&self) -> Result<Vec<u8>, StoreError> {
        let path = Self::required(&self.log_export_path, "log export")?;
        Self::read(path).await
    }

    async fn import_backup(&self, data: Vec<u8>) -> Result<(), StoreError> {
        let path = Self::required(&self.import_path, "import")?;

        tokio::fs::write(path, &data)
            .await
            .map_err(|e| StoreError::Io {
                message: format!("Failed to write imported backup: {e}"),
                path: path.to_path_buf(),
                location: ErrorLocation::from(Location::caller()),
                source: e,
            })?;

        info!("Imported {} bytes into {}", data.len(), path.display());
        Ok(())
    }
}
