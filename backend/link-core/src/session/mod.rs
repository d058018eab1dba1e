//! Control point session lifecycle.
//!
//! [`SessionManager`] owns at most one [`Session`]: a `CP` channel, the
//! announced [`PeerInfo`], the command handler tasks and a lifecycle watcher.
//! Handlers are subscribed on the channel before it connects, so the first
//! request after the handshake always finds its handler.
//!
//! # Status
//!
//! ```text
//! Disconnected --connect()--> Connecting --ok--> Connected
//! Connecting --error--> Disconnected (+ error)
//! Connected --disconnect--> Disconnected --reconnect--> Connected
//! ```
//!
//! Disconnect and reconnect notifications come from the channel and may
//! arrive at any time after `connect()` returned.

pub mod commands;
pub mod status;

pub use commands::{Command, CommandHandlers, PeerInfo, TEST_EVENT_ACK};
pub use status::{ConnectionState, ConnectionStatus, StatusCommand, StatusTracker};

use crate::backup::BackupPipeline;
use crate::channel::{ChannelEvent, ChannelOptions, DuplexChannel};
use crate::discovery::{self, ChannelProber, Prober};
use crate::error::session::ConnectError;
use crate::network::resolve_local_network_address;
use crate::rpc::register_handler;
use crate::store::BackupStore;
use crate::{DEFAULT_CHANNEL_TIMEOUT, DEFAULT_PORT};

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Where to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectTarget {
    /// Scan the local subnet, then announce this info to the server.
    Discover(PeerInfo),
    /// Connect straight to a known `host:port`.
    Direct(String),
}

/// Connection settings for a [`SessionManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub port: u16,
    pub channel_timeout: Duration,
    /// Overrides the resolved local address used for discovery.
    pub local_address: Option<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            channel_timeout: DEFAULT_CHANNEL_TIMEOUT,
            local_address: None,
        }
    }
}

/// One established control point connection.
pub struct Session {
    id: Uuid,
    channel: Arc<DuplexChannel>,
    peer_info: Option<PeerInfo>,
    handler_tasks: Vec<JoinHandle<()>>,
    watcher: Option<JoinHandle<()>>,
}

impl Session {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn address(&self) -> &str {
        self.channel.address()
    }

    pub fn peer_info(&self) -> Option<&PeerInfo> {
        self.peer_info.as_ref()
    }

    /// Stop background work and close the channel.
    async fn close(mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
        for task in self.handler_tasks.drain(..) {
            task.abort();
        }
        self.channel.disconnect().await;
        info!("Session {} closed", self.id);
    }
}

/// Owns the active session and its public status.
pub struct SessionManager {
    settings: SessionSettings,
    pipeline: BackupPipeline,
    prober: Arc<dyn Prober>,
    status: StatusTracker,
    session: Mutex<Option<Session>>,
}

impl SessionManager {
    pub fn new(settings: SessionSettings, store: Arc<dyn BackupStore>) -> Self {
        let prober = Arc::new(ChannelProber::new(settings.channel_timeout));
        Self {
            settings,
            pipeline: BackupPipeline::new(store),
            prober,
            status: StatusTracker::new(),
            session: Mutex::new(None),
        }
    }

    /// Replace the prober used by discovery.
    pub fn with_prober(mut self, prober: Arc<dyn Prober>) -> Self {
        self.prober = prober;
        self
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub async fn status(&self) -> ConnectionStatus {
        self.status.current().await
    }

    /// Every status change from now on.
    pub fn subscribe_status(&self) -> broadcast::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    pub async fn peer_info(&self) -> Option<PeerInfo> {
        self.session
            .lock()
            .await
            .as_ref()
            .and_then(|session| session.peer_info.clone())
    }

    pub async fn session_id(&self) -> Option<Uuid> {
        self.session.lock().await.as_ref().map(Session::id)
    }

    pub async fn server_address(&self) -> Option<String> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|session| session.address().to_string())
    }

    /// Establish a session with `target`, replacing any current one.
    ///
    /// # Errors
    ///
    /// - [`ConnectError::Discovery`] if no server is found or the local
    ///   address is malformed
    /// - [`ConnectError::Channel`] if the channel cannot be opened
    ///
    /// On error the status goes back to Disconnected with the message and no
    /// handler stays registered.
    pub async fn connect(&self, target: ConnectTarget) -> Result<(), ConnectError> {
        let mut slot = self.session.lock().await;

        if let Some(previous) = slot.take() {
            info!("Replacing session {}", previous.id);
            previous.close().await;
        }

        self.status.apply(StatusCommand::BeginConnect).await;

        match self.open_session(target).await {
            Ok((mut session, lifecycle)) => {
                self.status.apply(StatusCommand::Connected).await;
                session.watcher = Some(tokio::spawn(watch_lifecycle(
                    lifecycle,
                    self.status.clone(),
                )));
                info!(
                    "Session {} connected to {}",
                    session.id,
                    session.address()
                );
                *slot = Some(session);
                Ok(())
            }
            Err(e) => {
                warn!("Connect failed: {e}");
                self.status.apply(StatusCommand::Failed(e.to_string())).await;
                Err(e)
            }
        }
    }

    /// Reopen the current session's channel. No-op without a session.
    pub async fn reconnect(&self) -> Result<(), ConnectError> {
        let slot = self.session.lock().await;
        let Some(session) = slot.as_ref() else {
            debug!("Reconnect requested without a session");
            return Ok(());
        };

        match session.channel.connect().await {
            Ok(()) => {
                self.status.apply(StatusCommand::Connected).await;
                Ok(())
            }
            Err(e) => {
                self.status.apply(StatusCommand::Failed(e.to_string())).await;
                Err(e.into())
            }
        }
    }

    /// Close the current session's channel, keeping the session and its
    /// peer info for a later [`SessionManager::reconnect`].
    pub async fn disconnect(&self) {
        let slot = self.session.lock().await;
        if let Some(session) = slot.as_ref() {
            session.channel.disconnect().await;
            self.status.apply(StatusCommand::Disconnected).await;
        }
    }

    /// Close and forget the current session.
    pub async fn end_session(&self) {
        if let Some(session) = self.session.lock().await.take() {
            session.close().await;
            self.status.apply(StatusCommand::Disconnected).await;
        }
    }

    /// Resolve the address, open the channel and install handlers.
    ///
    /// Also returns a lifecycle subscription taken before the channel
    /// connected, so no notification is missed before the watcher starts.
    async fn open_session(
        &self,
        target: ConnectTarget,
    ) -> Result<(Session, broadcast::Receiver<ChannelEvent>), ConnectError> {
        let (address, peer_info) = match target {
            ConnectTarget::Discover(peer_info) => {
                let local_address = self
                    .settings
                    .local_address
                    .clone()
                    .unwrap_or_else(resolve_local_network_address);
                let address = discovery::scan(
                    &local_address,
                    self.settings.port,
                    Arc::clone(&self.prober),
                )
                .await?;
                (address, Some(peer_info))
            }
            ConnectTarget::Direct(address) => (address, None),
        };

        let channel = Arc::new(DuplexChannel::new(
            &address,
            ChannelOptions::control_point(self.settings.channel_timeout),
        )?);

        let handlers = CommandHandlers::new(peer_info.clone(), self.pipeline.clone());
        let handler_tasks = install_handlers(&channel, handlers);
        let lifecycle = channel.lifecycle();

        if let Err(e) = channel.connect().await {
            for task in handler_tasks {
                task.abort();
            }
            return Err(e.into());
        }

        let session = Session {
            id: Uuid::new_v4(),
            channel,
            peer_info,
            handler_tasks,
            watcher: None,
        };

        Ok((session, lifecycle))
    }
}

/// Subscribe every [`Command`] on `channel`.
fn install_handlers(
    channel: &Arc<DuplexChannel>,
    handlers: CommandHandlers,
) -> Vec<JoinHandle<()>> {
    debug!("Signing up to events on {}", channel.address());

    let handlers = Arc::new(handlers);
    Command::ALL
        .into_iter()
        .map(|command| {
            let handlers = Arc::clone(&handlers);
            register_handler(channel, command.event_name(), move |payload| {
                let handlers = Arc::clone(&handlers);
                async move { handlers.dispatch(command, payload).await }
            })
        })
        .collect()
}

/// Mirror channel lifecycle notifications into the status.
async fn watch_lifecycle(mut events: broadcast::Receiver<ChannelEvent>, status: StatusTracker) {
    loop {
        match events.recv().await {
            Ok(ChannelEvent::Disconnect) => {
                status.apply(StatusCommand::Disconnected).await;
            }
            Ok(ChannelEvent::Reconnect) => {
                status.apply(StatusCommand::Connected).await;
            }
            Ok(ChannelEvent::ConnectError(message)) => {
                status.apply(StatusCommand::Failed(message)).await;
            }
            Ok(ChannelEvent::Connect) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Lifecycle watcher skipped {skipped} events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
