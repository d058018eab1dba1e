use crate::error::backup::BackupError;

use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

/// Failure of a registered command handler.
///
/// Never leaves the RPC layer: it is turned into a `success: false` answer.
#[derive(Debug, ThisError)]
pub enum HandlerError {
    #[error("Handler Error: {message} {location}")]
    Failed {
        message: String,
        location: ErrorLocation,
    },

    #[error("Invalid Payload Error: {message} {location}")]
    InvalidPayload {
        message: String,
        location: ErrorLocation,
    },

    #[error("Handler Panicked Error: {message} {location}")]
    Panicked {
        message: String,
        location: ErrorLocation,
    },

    #[error(transparent)]
    Backup(#[from] BackupError),
}

impl HandlerError {
    /// Message sent to the peer in the answer envelope.
    ///
    /// Locations are for our logs; the peer only gets the human part.
    pub fn answer_message(&self) -> String {
        match self {
            HandlerError::Failed { message, .. }
            | HandlerError::InvalidPayload { message, .. }
            | HandlerError::Panicked { message, .. } => message.clone(),
            HandlerError::Backup(error) => error.answer_message(),
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    #[track_caller]
    fn from(error: serde_json::Error) -> Self {
        HandlerError::Failed {
            message: format!("Failed to serialize answer: {error}"),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
