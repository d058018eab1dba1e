//! Fixed-device endpoint of the link.
//!
//! [`PeerServer`] listens for channels and sorts them by the `identity`
//! query parameter of the upgrade request:
//!
//! - `TEST` connections are discovery probes: counted, then drained until
//!   the prober closes them
//! - `CP` connections become [`PeerConnection`]s, handed out in arrival
//!   order by [`PeerServer::next_control_point`]
//! - anything else is refused during the handshake with `400 Bad Request`

mod connection;

pub use connection::PeerConnection;

use crate::error::peer::PeerError;
use crate::wire::{ConnectionIdentity, IDENTITY_QUERY_KEY};

use common::ErrorLocation;

use std::net::SocketAddr;
use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::StreamExt;
use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;

#[derive(Default)]
struct ProbeCounters {
    seen: AtomicUsize,
    open: AtomicUsize,
}

/// Listening endpoint for control points and probes.
pub struct PeerServer {
    local_addr: SocketAddr,
    control_points: Mutex<mpsc::UnboundedReceiver<PeerConnection>>,
    probes: Arc<ProbeCounters>,
    accept_task: JoinHandle<()>,
}

impl PeerServer {
    /// Bind to `address` and start accepting in the background.
    ///
    /// # Errors
    ///
    /// Returns [`PeerError::Io`] if the address cannot be bound.
    pub async fn bind(address: &str) -> Result<Self, PeerError> {
        let listener = TcpListener::bind(address).await?;
        let local_addr = listener.local_addr()?;

        info!("Peer endpoint listening on {local_addr}");

        let (tx, rx) = mpsc::unbounded_channel();
        let probes = Arc::new(ProbeCounters::default());
        let accept_task = tokio::spawn(accept_loop(listener, tx, Arc::clone(&probes)));

        Ok(Self {
            local_addr,
            control_points: Mutex::new(rx),
            probes,
            accept_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Next `CP` connection, waiting for one if none is queued.
    ///
    /// Returns `None` once the endpoint has stopped accepting.
    pub async fn next_control_point(&self) -> Option<PeerConnection> {
        self.control_points.lock().await.recv().await
    }

    /// Discovery probes accepted so far.
    pub fn probes_seen(&self) -> usize {
        self.probes.seen.load(Ordering::SeqCst)
    }

    /// Discovery probes not yet closed by their prober.
    pub fn probes_open(&self) -> usize {
        self.probes.open.load(Ordering::SeqCst)
    }

    /// Stop accepting new connections.
    pub fn shutdown(&self) {
        self.accept_task.abort();
    }
}

impl Drop for PeerServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn accept_loop(
    listener: TcpListener,
    control_points: mpsc::UnboundedSender<PeerConnection>,
    probes: Arc<ProbeCounters>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!("Connection attempt from {addr}");
                let control_points = control_points.clone();
                let probes = Arc::clone(&probes);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, addr, control_points, probes).await {
                        warn!("Connection from {addr} dropped: {e}");
                    }
                });
            }
            Err(e) => {
                error!("Accept failed: {e}");
                break;
            }
        }
    }
}

/// Upgrade one TCP connection and route it by identity.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    control_points: mpsc::UnboundedSender<PeerConnection>,
    probes: Arc<ProbeCounters>,
) -> Result<(), PeerError> {
    let mut identity = None;

    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        match identity_of(request) {
            Ok(found) => {
                identity = Some(found);
                Ok(response)
            }
            Err(reason) => {
                warn!("Refusing {addr}: {reason}");
                Err(refusal(reason))
            }
        }
    };

    let mut ws_stream = accept_hdr_async(stream, callback)
        .await
        .map_err(|e| PeerError::Handshake {
            message: format!("WebSocket handshake with {addr} failed: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

    match identity {
        Some(ConnectionIdentity::Test) => {
            probes.seen.fetch_add(1, Ordering::SeqCst);
            probes.open.fetch_add(1, Ordering::SeqCst);
            debug!("Probe from {addr}");

            while let Some(Ok(message)) = ws_stream.next().await {
                if matches!(message, Message::Close(_)) {
                    break;
                }
            }

            probes.open.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
        Some(ConnectionIdentity::ControlPoint) => {
            info!("Control point connected from {addr}");
            control_points
                .send(PeerConnection::start(ws_stream, addr))
                .map_err(|_| PeerError::Io {
                    message: "Peer endpoint is no longer taking control points".to_string(),
                    location: ErrorLocation::from(Location::caller()),
                })
        }
        None => Ok(()),
    }
}

/// Read the `identity` query parameter of an upgrade request.
pub(crate) fn identity_of(request: &Request) -> Result<ConnectionIdentity, String> {
    let query = request.uri().query().unwrap_or_default();

    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == IDENTITY_QUERY_KEY)
        .ok_or_else(|| format!("missing '{IDENTITY_QUERY_KEY}' parameter"))?
        .1
        .parse()
}

fn refusal(reason: String) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason));
    *response.status_mut() = StatusCode::BAD_REQUEST;
    response
}
