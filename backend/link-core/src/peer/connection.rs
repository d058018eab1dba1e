//! One accepted control point, seen from the fixed device.

use crate::channel::listeners::ListenerTable;
use crate::channel::{ChannelEvent, lock_listeners, read_loop, write_loop};
use crate::error::peer::PeerError;
use crate::wire::{EventEnvelope, WireFrame, answer_event};

use common::ErrorLocation;

use std::net::SocketAddr;
use std::panic::Location;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use futures_util::StreamExt;
use log::{debug, info};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

const LIFECYCLE_BUFFER: usize = 8;

/// Accepted `CP` connection that requests can be issued on.
pub struct PeerConnection {
    address: SocketAddr,
    outbound: mpsc::UnboundedSender<Message>,
    listeners: Arc<StdMutex<ListenerTable>>,
    connected: Arc<AtomicBool>,
    lifecycle: broadcast::Sender<ChannelEvent>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl PeerConnection {
    pub(crate) fn start(stream: WebSocketStream<TcpStream>, address: SocketAddr) -> Self {
        let (sink, source) = stream.split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let listeners = Arc::new(StdMutex::new(ListenerTable::default()));
        let connected = Arc::new(AtomicBool::new(true));
        let (lifecycle, _) = broadcast::channel(LIFECYCLE_BUFFER);

        let writer = tokio::spawn(write_loop(sink, outbound_rx));
        let reader = tokio::spawn(read_loop(
            source,
            address.to_string(),
            Arc::clone(&listeners),
            Arc::clone(&connected),
            lifecycle.clone(),
        ));

        Self {
            address,
            outbound,
            listeners,
            connected,
            lifecycle,
            reader,
            writer,
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Send `data` as a raw named event, without waiting for anything.
    ///
    /// # Errors
    ///
    /// Returns [`PeerError::Send`] if the connection is gone.
    pub fn send(&self, event: &str, data: Value) -> Result<(), PeerError> {
        let text = WireFrame::new(event, data)
            .encode()
            .map_err(|e| PeerError::Send {
                message: format!("Failed to encode '{event}': {e}"),
                location: ErrorLocation::from(Location::caller()),
            })?;

        if !self.is_connected() {
            return Err(PeerError::Send {
                message: format!("Connection with {} is closed", self.address),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        self.outbound
            .send(Message::Text(text.into()))
            .map_err(|_| PeerError::Send {
                message: format!("Writer for {} has stopped", self.address),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    /// Invoke `event` on the control point and wait for its answer.
    ///
    /// The answer listener is attached before the request goes out.
    ///
    /// # Errors
    ///
    /// - [`PeerError::Send`] if the request cannot be sent
    /// - [`PeerError::AnswerTimeout`] if no answer arrives within `wait`
    /// - [`PeerError::InvalidAnswer`] if the connection closes first or the
    ///   answer is not a valid envelope
    pub async fn request(
        &self,
        event: &str,
        data: Value,
        wait: Duration,
    ) -> Result<EventEnvelope, PeerError> {
        let answer_name = answer_event(event);
        let answer = lock_listeners(&self.listeners).once(&answer_name);

        let request = serde_json::to_value(EventEnvelope::request(event, data)).map_err(|e| {
            PeerError::Send {
                message: format!("Failed to encode '{event}' request: {e}"),
                location: ErrorLocation::from(Location::caller()),
            }
        })?;
        self.send(event, request)?;
        debug!("Sent '{event}' to {}, waiting for '{answer_name}'", self.address);

        let value = timeout(wait, answer)
            .await
            .map_err(|_| PeerError::AnswerTimeout {
                message: format!("No '{answer_name}' from {} within {wait:?}", self.address),
                location: ErrorLocation::from(Location::caller()),
            })?
            .map_err(|_| PeerError::InvalidAnswer {
                message: format!("Connection with {} closed before '{answer_name}'", self.address),
                location: ErrorLocation::from(Location::caller()),
            })?;

        serde_json::from_value(value).map_err(|e| PeerError::InvalidAnswer {
            message: format!("Malformed '{answer_name}': {e}"),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    /// Persistent subscription to frames named `event`.
    pub fn on(&self, event: &str) -> mpsc::UnboundedReceiver<Value> {
        lock_listeners(&self.listeners).on(event)
    }

    /// `Disconnect` is raised when the control point goes away.
    pub fn lifecycle(&self) -> broadcast::Receiver<ChannelEvent> {
        self.lifecycle.subscribe()
    }

    /// Ask the control point to close.
    pub fn close(&self) {
        if self.outbound.send(Message::Close(None)).is_ok() {
            info!("Closing connection with {}", self.address);
        }
    }
}

impl Drop for PeerConnection {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}
