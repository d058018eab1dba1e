use crate::error::channel::ChannelError;

use common::ErrorLocation;

use std::io::Error as IoError;
use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum PeerError {
    #[error("IO Error: {message} {location}")]
    Io {
        message: String,
        location: ErrorLocation,
    },

    #[error("Handshake Error: {message} {location}")]
    Handshake {
        message: String,
        location: ErrorLocation,
    },

    #[error("Send Error: {message} {location}")]
    Send {
        message: String,
        location: ErrorLocation,
    },

    #[error("Answer Timeout Error: {message} {location}")]
    AnswerTimeout {
        message: String,
        location: ErrorLocation,
    },

    #[error("Invalid Answer Error: {message} {location}")]
    InvalidAnswer {
        message: String,
        location: ErrorLocation,
    },

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

impl From<IoError> for PeerError {
    #[track_caller]
    fn from(error: IoError) -> Self {
        PeerError::Io {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
