pub mod backup;
pub mod channel;
pub mod config;
pub mod discovery;
pub mod handler;
pub mod peer;
pub mod session;
pub mod store;

pub use backup::BackupError;
pub use channel::ChannelError;
pub use config::ConfigError;
pub use discovery::DiscoveryError;
pub use handler::HandlerError;
pub use peer::PeerError;
pub use session::ConnectError;
pub use store::StoreError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error(transparent)]
    Peer(#[from] PeerError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
