use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;
use tokio_tungstenite::tungstenite::Error as WsError;

#[derive(Debug, ThisError)]
pub enum ChannelError {
    #[error("Invalid Address Error: {message} {location}")]
    InvalidAddress {
        message: String,
        location: ErrorLocation,
    },

    #[error("Connect Error: {message} {location}")]
    Connect {
        message: String,
        location: ErrorLocation,
    },

    #[error("Connect Timeout Error: {message} {location}")]
    Timeout {
        message: String,
        location: ErrorLocation,
    },

    #[error("Identity Rejected Error: {message} {location}")]
    IdentityRejected {
        message: String,
        location: ErrorLocation,
    },

    #[error("Reconnect Disabled Error: {message} {location}")]
    ReconnectDisabled {
        message: String,
        location: ErrorLocation,
    },

    #[error("Not Connected Error: {message} {location}")]
    NotConnected {
        message: String,
        location: ErrorLocation,
    },

    #[error("Encode Error: {message} {location}")]
    Encode {
        message: String,
        location: ErrorLocation,
    },
}

impl From<WsError> for ChannelError {
    #[track_caller]
    fn from(error: WsError) -> Self {
        let location = ErrorLocation::from(Location::caller());
        match error {
            WsError::Http(response) => ChannelError::IdentityRejected {
                message: format!("Handshake refused with status {}", response.status()),
                location,
            },
            other => ChannelError::Connect {
                message: other.to_string(),
                location,
            },
        }
    }
}

impl From<serde_json::Error> for ChannelError {
    #[track_caller]
    fn from(error: serde_json::Error) -> Self {
        ChannelError::Encode {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
