use crate::error::channel::ChannelError;
use crate::error::discovery::DiscoveryError;

use thiserror::Error as ThisError;

/// Failure while establishing a session.
///
/// Wraps the step that failed: the subnet scan or the channel open.
#[derive(Debug, ThisError)]
pub enum ConnectError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}
