use common::ErrorLocation;

use std::io::Error as IoError;
use std::panic::Location;
use std::path::PathBuf;

use thiserror::Error as ThisError;

/// Failure reported by a [`BackupStore`](crate::store::BackupStore).
#[derive(Debug, ThisError)]
pub enum StoreError {
    #[error("Store Unavailable Error: {message} {location}")]
    Unavailable {
        message: String,
        location: ErrorLocation,
    },

    #[error("Store IO Error: {path}: {message} {location}")]
    Io {
        message: String,
        path: PathBuf,
        location: ErrorLocation,
        #[source]
        source: IoError,
    },

    #[error("Store Error: {message} {location}")]
    Other {
        message: String,
        location: ErrorLocation,
    },
}

impl StoreError {
    /// Builds an [`StoreError::Other`] at the caller's location.
    #[track_caller]
    pub fn other(message: impl Into<String>) -> Self {
        StoreError::Other {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Message without location.
    pub fn message(&self) -> &str {
        match self {
            StoreError::Unavailable { message, .. }
            | StoreError::Io { message, .. }
            | StoreError::Other { message, .. } => message,
        }
    }
}
