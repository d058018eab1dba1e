//! Connection status owned by the session manager.
//!
//! Reads go through an `Arc<RwLock<_>>` snapshot. Every change is also
//! published on a broadcast channel so the UI can follow the exact sequence
//! of transitions instead of sampling the latest value.

use std::sync::Arc;

use log::{debug, info};
use serde::Serialize;
use tokio::sync::{RwLock, broadcast};

const STATUS_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Public status: state plus the last error, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub error: Option<String>,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            error: None,
        }
    }
}

/// Status transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusCommand {
    /// `connect()` started; clears the previous error.
    BeginConnect,
    /// Channel open (or reopened).
    Connected,
    /// Channel closed; keeps the last error for display.
    Disconnected,
    /// Connect or reconnect failed.
    Failed(String),
}

#[derive(Clone)]
pub struct StatusTracker {
    current: Arc<RwLock<ConnectionStatus>>,
    changes: broadcast::Sender<ConnectionStatus>,
}

impl StatusTracker {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(STATUS_BUFFER);
        Self {
            current: Arc::new(RwLock::new(ConnectionStatus::default())),
            changes,
        }
    }

    pub async fn current(&self) -> ConnectionStatus {
        self.current.read().await.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionStatus> {
        self.changes.subscribe()
    }

    /// Apply a transition and publish the result if anything changed.
    pub async fn apply(&self, command: StatusCommand) -> ConnectionStatus {
        let mut current = self.current.write().await;
        let next = next_status(&current, command);

        if next == *current {
            debug!("Status unchanged: {:?}", next.state);
            return next;
        }

        info!("Connection status {:?} -> {:?}", current.state, next.state);
        *current = next.clone();
        let _ = self.changes.send(next.clone());
        next
    }
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn next_status(current: &ConnectionStatus, command: StatusCommand) -> ConnectionStatus {
    match command {
        StatusCommand::BeginConnect => ConnectionStatus {
            state: ConnectionState::Connecting,
            error: None,
        },
        StatusCommand::Connected => ConnectionStatus {
            state: ConnectionState::Connected,
            error: None,
        },
        StatusCommand::Disconnected => ConnectionStatus {
            state: ConnectionState::Disconnected,
            error: current.error.clone(),
        },
        StatusCommand::Failed(message) => ConnectionStatus {
            state: ConnectionState::Disconnected,
            error: Some(message),
        },
    }
}
