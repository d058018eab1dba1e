//! Test helpers for link integration tests.
//!
//! - In-memory and failing backup stores
//! - Loopback peer endpoint and control point setup
//! - Fake probers for discovery
//! - Waiting on status changes

use link_core::channel::{ChannelOptions, DuplexChannel};
use link_core::discovery::{Prober, ScanResult};
use link_core::error::StoreError;
use link_core::peer::{PeerConnection, PeerServer};
use link_core::session::{ConnectionStatus, SessionSettings};
use link_core::store::BackupStore;
use link_core::LOOPBACK_ADDRESS;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::time::timeout;

/// Upper bound for anything a test waits on.
pub const TEST_WAIT: Duration = Duration::from_secs(5);

/// Channel connect timeout used by tests.
pub const TEST_CHANNEL_TIMEOUT: Duration = Duration::from_millis(500);

/// Store that keeps dumps in memory and records imports.
#[derive(Default)]
pub struct MemoryStore {
    pub data: Vec<u8>,
    pub logs: Vec<u8>,
    imported: Mutex<Vec<Vec<u8>>>,
}

impl MemoryStore {
    pub fn new(data: &[u8], logs: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
            logs: logs.to_vec(),
            imported: Mutex::new(Vec::new()),
        }
    }

    pub fn imported(&self) -> Vec<Vec<u8>> {
        self.imported.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackupStore for MemoryStore {
    async fn export_data_backup(&self) -> Result<Vec<u8>, StoreError> {
        Ok(self.data.clone())
    }

    async fn export_log_backup(&self) -> Result<Vec<u8>, StoreError> {
        Ok(self.logs.clone())
    }

    async fn import_backup(&self, data: Vec<u8>) -> Result<(), StoreError> {
        self.imported.lock().unwrap().push(data);
        Ok(())
    }
}

/// Store whose every operation fails.
pub struct FailingStore;

#[async_trait]
impl BackupStore for FailingStore {
    async fn export_data_backup(&self) -> Result<Vec<u8>, StoreError> {
        Err(StoreError::other("database is locked"))
    }

    async fn export_log_backup(&self) -> Result<Vec<u8>, StoreError> {
        Err(StoreError::other("log database is locked"))
    }

    async fn import_backup(&self, _data: Vec<u8>) -> Result<(), StoreError> {
        Err(StoreError::other("import refused"))
    }
}

/// Prober that reports only `reachable` addresses as up, after `delay`
/// for every other address.
pub struct FakeProber {
    reachable: HashSet<String>,
    unreachable_delay: Duration,
    calls: AtomicUsize,
}

impl FakeProber {
    pub fn new(reachable: &[&str], unreachable_delay: Duration) -> Self {
        Self {
            reachable: reachable.iter().map(|address| address.to_string()).collect(),
            unreachable_delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn none() -> Self {
        Self::new(&[], Duration::ZERO)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for FakeProber {
    async fn probe(&self, address: String) -> ScanResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reachable = self.reachable.contains(&address);
        if !reachable {
            tokio::time::sleep(self.unreachable_delay).await;
        }
        ScanResult { address, reachable }
    }
}

/// Peer endpoint on an ephemeral loopback port.
pub async fn start_peer_server() -> PeerServer {
    PeerServer::bind(&format!("{LOOPBACK_ADDRESS}:0"))
        .await
        .expect("Failed to bind peer endpoint")
}

/// `host:port` of `server`.
pub fn server_address(server: &PeerServer) -> String {
    server.local_addr().to_string()
}

/// A loopback address nothing listens on.
pub async fn unused_address() -> String {
    let listener = tokio::net::TcpListener::bind(format!("{LOOPBACK_ADDRESS}:0"))
        .await
        .expect("Failed to bind");
    let address = listener.local_addr().expect("No local address").to_string();
    drop(listener);
    address
}

/// Wait until nothing accepts TCP connections on `address` any more.
pub async fn wait_until_refused(address: &str) {
    let refused = timeout(TEST_WAIT, async {
        while tokio::net::TcpStream::connect(address).await.is_ok() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(refused.is_ok(), "{address} still accepts connections");
}

/// Session settings that discover `server` on the loopback subnet.
pub fn loopback_settings(server: &PeerServer) -> SessionSettings {
    SessionSettings {
        port: server.local_addr().port(),
        channel_timeout: TEST_CHANNEL_TIMEOUT,
        local_address: Some("127.0.0.200".to_string()),
    }
}

/// Next control point accepted by `server`, failing the test on timeout.
pub async fn accept_control_point(server: &PeerServer) -> PeerConnection {
    timeout(TEST_WAIT, server.next_control_point())
        .await
        .expect("No control point connected in time")
        .expect("Peer endpoint stopped")
}

/// Connected `CP` channel to `server` plus the server's side of it.
pub async fn connected_pair(server: &PeerServer) -> (Arc<DuplexChannel>, PeerConnection) {
    let channel = Arc::new(
        DuplexChannel::new(
            &server_address(server),
            ChannelOptions::control_point(TEST_CHANNEL_TIMEOUT),
        )
        .expect("Invalid address"),
    );
    channel.connect().await.expect("Failed to connect");
    let peer = accept_control_point(server).await;
    (channel, peer)
}

/// Wait for the first status matching `predicate`.
pub async fn wait_for_status<F>(
    changes: &mut broadcast::Receiver<ConnectionStatus>,
    predicate: F,
) -> ConnectionStatus
where
    F: Fn(&ConnectionStatus) -> bool,
{
    timeout(TEST_WAIT, async {
        loop {
            let status = changes.recv().await.expect("Status stream ended");
            if predicate(&status) {
                return status;
            }
        }
    })
    .await
    .expect("Expected status never arrived")
}

/// Poll `condition` until it holds, failing the test after [`TEST_WAIT`].
pub async fn eventually<F>(condition: F, what: &str)
where
    F: Fn() -> bool,
{
    let polled = timeout(TEST_WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "Timed out waiting for {what}");
}
