use common::ErrorLocation;

use link_core::error::{ConfigError, ConnectError, PeerError};

use std::panic::Location;

use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the service tool commands.
///
/// Core errors are flattened to their message so the whole enum stays
/// serializable, with the location of the conversion kept alongside.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ServiceToolError {
    /// Error from this app
    #[error("Service Tool Error: {message} {location}")]
    ServiceTool {
        message: String,
        location: ErrorLocation,
    },

    /// Error from link-core operations (discovery, channel, peer endpoint)
    #[error("Core Error: {message} {location}")]
    Core {
        message: String,
        location: ErrorLocation,
    },

    /// Config could not be loaded or is invalid
    #[error("Config Error: {message} {location}")]
    Config {
        message: String,
        location: ErrorLocation,
    },

    /// The other side answered a request with a failure
    #[error("Request Failed Error: {message} {location}")]
    RequestFailed {
        message: String,
        location: ErrorLocation,
    },

    /// Stopped by the operator before finishing
    #[error("Interrupted Error: {message} {location}")]
    Interrupted {
        message: String,
        location: ErrorLocation,
    },
}

impl From<ConnectError> for ServiceToolError {
    #[track_caller]
    fn from(error: ConnectError) -> Self {
        ServiceToolError::Core {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<PeerError> for ServiceToolError {
    #[track_caller]
    fn from(error: PeerError) -> Self {
        ServiceToolError::Core {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<ConfigError> for ServiceToolError {
    #[track_caller]
    fn from(error: ConfigError) -> Self {
        ServiceToolError::Config {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
