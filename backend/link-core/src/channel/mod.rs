//! Named-event duplex channel over WebSocket.
//!
//! A [`DuplexChannel`] is created unconnected. Listeners can be attached
//! before [`DuplexChannel::connect`] so nothing that arrives right after the
//! handshake is lost. Every frame is a JSON [`WireFrame`]; the reader task
//! fans frames out to listeners by event name.
//!
//! # Lifecycle
//!
//! Connect, connect errors, disconnects and reconnects are published on a
//! broadcast stream of [`ChannelEvent`]. `Disconnect` is raised exactly once
//! per established connection, whether the local side closed it or the peer
//! went away.
//!
//! When the peer goes away from a channel built with reconnection, one
//! reconnect attempt is made right away, bounded by the connect timeout. It
//! raises `Reconnect` on success and `ConnectError` on failure.

pub(crate) mod listeners;

use crate::error::channel::ChannelError;
use crate::wire::{ConnectionIdentity, IDENTITY_QUERY_KEY, WireFrame};
use crate::{CHANNEL_SCHEME, DEFAULT_CHANNEL_TIMEOUT};

use listeners::ListenerTable;

use common::ErrorLocation;

use std::fmt::Display;
use std::panic::Location;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::{FutureExt, Sink, SinkExt, Stream, StreamExt};
use log::{debug, info, trace, warn};
use serde_json::Value;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use url::Url;

const LIFECYCLE_BUFFER: usize = 32;

/// Lifecycle notification raised by a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Connect,
    ConnectError(String),
    Disconnect,
    Reconnect,
}

/// How a channel connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOptions {
    pub identity: ConnectionIdentity,
    /// Upper bound on a single connect attempt.
    pub timeout: Duration,
    /// Whether the channel reopens after the peer drops it, and whether
    /// `connect` may be called again after a first connection.
    pub reconnection: bool,
}

impl ChannelOptions {
    /// One-shot reachability probe.
    pub fn probe(timeout: Duration) -> Self {
        Self {
            identity: ConnectionIdentity::Test,
            timeout,
            reconnection: false,
        }
    }

    /// Operational control point session.
    pub fn control_point(timeout: Duration) -> Self {
        Self {
            identity: ConnectionIdentity::ControlPoint,
            timeout,
            reconnection: true,
        }
    }
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self::control_point(DEFAULT_CHANNEL_TIMEOUT)
    }
}

struct Link {
    outbound: mpsc::UnboundedSender<Message>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Link {
    fn abort(self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Addressable, named-event, bidirectional message channel.
pub struct DuplexChannel {
    inner: Arc<ChannelInner>,
}

/// State shared with the reader task so it can reopen the channel.
struct ChannelInner {
    address: String,
    url: Url,
    options: ChannelOptions,
    listeners: Arc<StdMutex<ListenerTable>>,
    lifecycle: broadcast::Sender<ChannelEvent>,
    link: Mutex<Option<Link>>,
    connected: Arc<AtomicBool>,
    ever_connected: AtomicBool,
    /// Set by a local close; suppresses the automatic reconnect.
    closing: AtomicBool,
}

impl DuplexChannel {
    /// Create an unconnected channel to `address` (`host:port`).
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::InvalidAddress`] if `address` does not form a
    /// valid WebSocket URL.
    #[track_caller]
    pub fn new(address: &str, options: ChannelOptions) -> Result<Self, ChannelError> {
        let url = channel_url(address, options.identity)?;
        let (lifecycle, _) = broadcast::channel(LIFECYCLE_BUFFER);

        Ok(Self {
            inner: Arc::new(ChannelInner {
                address: address.to_string(),
                url,
                options,
                listeners: Arc::new(StdMutex::new(ListenerTable::default())),
                lifecycle,
                link: Mutex::new(None),
                connected: Arc::new(AtomicBool::new(false)),
                ever_connected: AtomicBool::new(false),
                closing: AtomicBool::new(false),
            }),
        })
    }

    pub fn address(&self) -> &str {
        &self.inner.address
    }

    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    /// Open the socket.
    ///
    /// Raises [`ChannelEvent::Connect`] on the first success and
    /// [`ChannelEvent::Reconnect`] on later ones. Calling this while already
    /// connected is a no-op.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::Connect`] / [`ChannelError::IdentityRejected`] if the
    ///   handshake fails
    /// - [`ChannelError::Timeout`] if it does not finish within the
    ///   configured timeout
    /// - [`ChannelError::ReconnectDisabled`] on a second connect of a channel
    ///   built without reconnection
    pub async fn connect(&self) -> Result<(), ChannelError> {
        self.inner.closing.store(false, Ordering::SeqCst);
        let mut link = self.inner.link.lock().await;
        self.inner.open(&mut link).await
    }

    /// Close the socket. No-op when not connected.
    pub async fn disconnect(&self) {
        let inner = &self.inner;
        inner.closing.store(true, Ordering::SeqCst);

        let Some(Link {
            outbound,
            reader,
            mut writer,
        }) = inner.link.lock().await.take()
        else {
            return;
        };

        let _ = outbound.send(Message::Close(None));
        drop(outbound);

        if timeout(inner.options.timeout, &mut writer).await.is_err() {
            warn!("Close frame to {} not flushed in time", inner.address);
            writer.abort();
        }
        reader.abort();

        if inner.connected.swap(false, Ordering::SeqCst) {
            info!("Channel to {} closed", inner.address);
            let _ = inner.lifecycle.send(ChannelEvent::Disconnect);
        }
    }

    /// Send one named event.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::NotConnected`] if the channel is closed
    /// - [`ChannelError::Encode`] if the frame cannot be serialized
    pub async fn emit(&self, event: &str, data: Value) -> Result<(), ChannelError> {
        let text = WireFrame::new(event, data).encode()?;
        let address = &self.inner.address;
        let link = self.inner.link.lock().await;

        match link.as_ref() {
            Some(link) if self.is_connected() => {
                trace!("Emitting '{event}' to {address}");
                link.outbound
                    .send(Message::Text(text.into()))
                    .map_err(|_| ChannelError::NotConnected {
                        message: format!("Writer for {address} has stopped"),
                        location: ErrorLocation::from(Location::caller()),
                    })
            }
            _ => Err(ChannelError::NotConnected {
                message: format!("Cannot emit '{event}': channel to {address} is closed"),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }

    /// Persistent subscription to `event`.
    ///
    /// Survives reconnects; ends when the receiver is dropped or
    /// [`DuplexChannel::off`] is called.
    pub fn on(&self, event: &str) -> mpsc::UnboundedReceiver<Value> {
        lock_listeners(&self.inner.listeners).on(event)
    }

    /// One-shot subscription to `event`.
    pub fn once(&self, event: &str) -> oneshot::Receiver<Value> {
        lock_listeners(&self.inner.listeners).once(event)
    }

    /// Remove every listener of `event`.
    pub fn off(&self, event: &str) {
        lock_listeners(&self.inner.listeners).off(event);
    }

    pub fn listener_count(&self, event: &str) -> usize {
        lock_listeners(&self.inner.listeners).listener_count(event)
    }

    /// Stream of lifecycle notifications from this point on.
    pub fn lifecycle(&self) -> broadcast::Receiver<ChannelEvent> {
        self.inner.lifecycle.subscribe()
    }
}

impl Drop for DuplexChannel {
    fn drop(&mut self) {
        self.inner.closing.store(true, Ordering::SeqCst);
    }
}

impl ChannelInner {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Connect while holding the link lock.
    async fn open(self: &Arc<Self>, link: &mut Option<Link>) -> Result<(), ChannelError> {
        if link.is_some() && self.is_connected() {
            debug!("Channel to {} already connected", self.address);
            return Ok(());
        }

        if self.ever_connected.load(Ordering::SeqCst) && !self.options.reconnection {
            return Err(ChannelError::ReconnectDisabled {
                message: format!("Channel to {} does not reconnect", self.address),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if let Some(stale) = link.take() {
            stale.abort();
        }

        trace!("Opening {} channel to {}", self.options.identity, self.url);

        let stream = match timeout(self.options.timeout, connect_async(self.url.as_str())).await {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => return Err(self.connect_failed(ChannelError::from(e))),
            Err(_) => {
                return Err(self.connect_failed(ChannelError::Timeout {
                    message: format!(
                        "No answer from {} within {:?}",
                        self.address, self.options.timeout
                    ),
                    location: ErrorLocation::from(Location::caller()),
                }));
            }
        };

        let (sink, source) = stream.split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        self.connected.store(true, Ordering::SeqCst);

        let writer = tokio::spawn(write_loop(sink, outbound_rx));
        let reader = tokio::spawn(read_then_resume(
            source,
            Arc::downgrade(self),
            self.address.clone(),
            Arc::clone(&self.listeners),
            Arc::clone(&self.connected),
            self.lifecycle.clone(),
        ));

        *link = Some(Link {
            outbound,
            reader,
            writer,
        });

        let event = if self.ever_connected.swap(true, Ordering::SeqCst) {
            ChannelEvent::Reconnect
        } else {
            ChannelEvent::Connect
        };

        info!(
            "{} channel to {} established ({:?})",
            self.options.identity, self.address, event
        );
        let _ = self.lifecycle.send(event);

        Ok(())
    }

    fn connect_failed(&self, error: ChannelError) -> ChannelError {
        let _ = self
            .lifecycle
            .send(ChannelEvent::ConnectError(error.to_string()));
        error
    }

    /// Single reconnect attempt after the peer dropped the channel.
    fn resume(self: Arc<Self>) -> BoxFuture<'static, ()> {
        async move {
            let mut link = self.link.lock().await;
            if self.closing.load(Ordering::SeqCst) || self.is_connected() {
                return;
            }

            info!("Channel to {} dropped, reconnecting", self.address);
            if let Err(e) = self.open(&mut link).await {
                warn!("Reconnect to {} failed: {e}", self.address);
            }
        }
        .boxed()
    }
}

impl Drop for ChannelInner {
    fn drop(&mut self) {
        if let Some(link) = self.link.get_mut().take() {
            trace!("Dropping open channel to {}", self.address);
            link.abort();
        }
    }
}

/// Reader task of a [`DuplexChannel`]: serve the socket, then start a
/// reconnect if the peer ended it.
async fn read_then_resume<S>(
    source: S,
    channel: Weak<ChannelInner>,
    origin: String,
    listeners: Arc<StdMutex<ListenerTable>>,
    connected: Arc<AtomicBool>,
    lifecycle: broadcast::Sender<ChannelEvent>,
) where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    read_loop(source, origin, listeners, connected, lifecycle).await;

    let Some(channel) = channel.upgrade() else {
        return;
    };
    if channel.options.reconnection && !channel.closing.load(Ordering::SeqCst) {
        // Runs apart from this task: reconnecting aborts the old reader.
        tokio::spawn(channel.resume());
    }
}

#[track_caller]
pub(crate) fn channel_url(
    address: &str,
    identity: ConnectionIdentity,
) -> Result<Url, ChannelError> {
    let mut url = Url::parse(&format!("{CHANNEL_SCHEME}{address}/")).map_err(|e| {
        ChannelError::InvalidAddress {
            message: format!("'{address}' is not a valid channel address: {e}"),
            location: ErrorLocation::from(Location::caller()),
        }
    })?;

    if url.host_str().is_none_or(str::is_empty) || url.port_or_known_default().is_none() {
        return Err(ChannelError::InvalidAddress {
            message: format!("'{address}' has no host"),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    url.query_pairs_mut()
        .append_pair(IDENTITY_QUERY_KEY, identity.as_str());

    Ok(url)
}

pub(crate) fn lock_listeners(listeners: &StdMutex<ListenerTable>) -> MutexGuard<'_, ListenerTable> {
    listeners.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Decode one text frame and hand it to the listeners of its event.
pub(crate) fn deliver_text(listeners: &StdMutex<ListenerTable>, text: &str, origin: &str) {
    let frame = match WireFrame::decode(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("Dropping malformed frame from {origin}: {e}");
            return;
        }
    };

    debug!("Received '{}' from {origin}", frame.event);

    let delivered = lock_listeners(listeners).dispatch(&frame.event, frame.data);
    if delivered == 0 {
        debug!("No listener for '{}' from {origin}", frame.event);
    }
}

/// Drain inbound messages into the listener table until the socket ends.
pub(crate) async fn read_loop<S>(
    mut source: S,
    origin: String,
    listeners: Arc<StdMutex<ListenerTable>>,
    connected: Arc<AtomicBool>,
    lifecycle: broadcast::Sender<ChannelEvent>,
) where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(message) = source.next().await {
        match message {
            Ok(Message::Text(text)) => deliver_text(&listeners, text.as_str(), &origin),
            Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                Ok(text) => deliver_text(&listeners, text, &origin),
                Err(_) => warn!("Dropping non-UTF-8 binary frame from {origin}"),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("Read error on channel with {origin}: {e}");
                break;
            }
        }
    }

    if connected.swap(false, Ordering::SeqCst) {
        info!("Channel with {origin} ended");
        let _ = lifecycle.send(ChannelEvent::Disconnect);
    }
}

/// Forward queued messages to the socket; stops after a close frame.
pub(crate) async fn write_loop<S>(mut sink: S, mut outbound: mpsc::UnboundedReceiver<Message>)
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    while let Some(message) = outbound.recv().await {
        let closing = matches!(message, Message::Close(_));
        if let Err(e) = sink.send(message).await {
            debug!("Write failed, stopping writer: {e}");
            break;
        }
        if closing {
            break;
        }
    }

    let _ = sink.close().await;
}
