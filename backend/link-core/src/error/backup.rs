use crate::error::store::StoreError;

use common::ErrorLocation;

use std::io::Error as IoError;
use std::panic::Location;

use thiserror::Error as ThisError;
use zip::result::ZipError;

#[derive(Debug, ThisError)]
pub enum BackupError {
    #[error("Export Error: {message} {location}")]
    Export {
        message: String,
        location: ErrorLocation,
        #[source]
        source: StoreError,
    },

    #[error("Import Error: {message} {location}")]
    Import {
        message: String,
        location: ErrorLocation,
        #[source]
        source: StoreError,
    },

    #[error("Archive Error: {message} {location}")]
    Archive {
        message: String,
        location: ErrorLocation,
    },

    #[error("Invalid Input Error: {message} {location}")]
    InvalidInput {
        message: String,
        location: ErrorLocation,
    },
}

impl BackupError {
    /// Message without location, as reported to the peer.
    pub fn answer_message(&self) -> String {
        match self {
            BackupError::Export { message, .. }
            | BackupError::Import { message, .. }
            | BackupError::Archive { message, .. }
            | BackupError::InvalidInput { message, .. } => message.clone(),
        }
    }
}

impl From<ZipError> for BackupError {
    #[track_caller]
    fn from(error: ZipError) -> Self {
        BackupError::Archive {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<IoError> for BackupError {
    #[track_caller]
    fn from(error: IoError) -> Self {
        BackupError::Archive {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
