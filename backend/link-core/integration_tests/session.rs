use crate::helpers::{
    FakeProber, MemoryStore, TEST_CHANNEL_TIMEOUT, TEST_WAIT, accept_control_point,
    loopback_settings, server_address, start_peer_server, unused_address, wait_for_status,
    wait_until_refused,
};

use link_core::error::{ConnectError, DiscoveryError};
use link_core::session::{
    ConnectTarget, ConnectionState, ConnectionStatus, PeerInfo, SessionManager, SessionSettings,
    TEST_EVENT_ACK,
};

use std::sync::Arc;

use serde_json::{Value, json};

fn new_manager(settings: SessionSettings) -> SessionManager {
    SessionManager::new(settings, Arc::new(MemoryStore::new(b"data", b"logs")))
}

fn direct_settings() -> SessionSettings {
    SessionSettings {
        channel_timeout: TEST_CHANNEL_TIMEOUT,
        ..SessionSettings::default()
    }
}

fn peer_info() -> PeerInfo {
    PeerInfo::new("CP-0042", "North Plant")
}

/// **VALUE**: Verifies a successful connect goes Connecting then Connected.
///
/// **WHY THIS MATTERS**: The UI shows a spinner on Connecting and the tools
/// on Connected; both transitions must be observable in order.
///
/// **BUG THIS CATCHES**: Would catch skipping Connecting, or reporting
/// Connected before the channel is actually open.
#[tokio::test]
async fn given_reachable_server_when_connecting_then_connecting_then_connected() {
    // GIVEN: A device and a manager watched from the start
    let server = start_peer_server().await;
    let manager = new_manager(direct_settings());
    let mut changes = manager.subscribe_status();

    // WHEN: Connecting directly
    manager
        .connect(ConnectTarget::Direct(server_address(&server)))
        .await
        .unwrap();

    // THEN: Exactly Connecting then Connected
    assert_eq!(changes.recv().await.unwrap().state, ConnectionState::Connecting);
    assert_eq!(changes.recv().await.unwrap().state, ConnectionState::Connected);
    assert!(manager.status().await.is_connected());
    assert_eq!(manager.server_address().await, Some(server_address(&server)));
    assert!(manager.session_id().await.is_some());
}

/// **VALUE**: Verifies a failed connect goes Connecting then Disconnected with the error.
///
/// **BUG THIS CATCHES**: Would catch:
/// - Status stuck on Connecting after a failure
/// - The error swallowed instead of returned to the caller
/// - A half-open session left behind
#[tokio::test]
async fn given_unreachable_server_when_connecting_then_disconnected_with_error() {
    let manager = new_manager(direct_settings());
    let mut changes = manager.subscribe_status();

    let result = manager
        .connect(ConnectTarget::Direct(unused_address().await))
        .await;

    assert!(matches!(result, Err(ConnectError::Channel(_))));
    assert_eq!(changes.recv().await.unwrap().state, ConnectionState::Connecting);
    let failed = changes.recv().await.unwrap();
    assert_eq!(failed.state, ConnectionState::Disconnected);
    assert!(failed.error.is_some());
    assert_eq!(manager.session_id().await, None);
}

/// **VALUE**: Verifies discovery failure is reported as a connect error.
#[tokio::test]
async fn given_no_server_on_subnet_when_discovering_then_discovery_error() {
    let settings = SessionSettings {
        local_address: Some("10.1.2.3".to_string()),
        ..direct_settings()
    };
    let manager = new_manager(settings).with_prober(Arc::new(FakeProber::none()));

    let result = manager.connect(ConnectTarget::Discover(peer_info())).await;

    assert!(matches!(
        result,
        Err(ConnectError::Discovery(DiscoveryError::NotFound { .. }))
    ));
    let status = manager.status().await;
    assert_eq!(status.state, ConnectionState::Disconnected);
    assert!(status.error.unwrap().contains("not found"));
}

/// **VALUE**: Verifies a discovered session answers the device's first requests.
///
/// **WHY THIS MATTERS**: The device talks first, right after the handshake.
/// Handlers registered late would miss `test_event`/`cp_info`.
///
/// **BUG THIS CATCHES**: Would catch:
/// - Handlers subscribed after connect
/// - `cp_info` not serialized with the `cp_id` field name
#[tokio::test]
async fn given_discovered_session_when_device_requests_then_handlers_answer() {
    // GIVEN: A session found through the real scanner
    let server = start_peer_server().await;
    let manager = new_manager(loopback_settings(&server));
    manager
        .connect(ConnectTarget::Discover(peer_info()))
        .await
        .unwrap();
    let peer = accept_control_point(&server).await;

    // WHEN: The device runs its opening requests
    let test = peer.request("test_event", Value::Null, TEST_WAIT).await.unwrap();
    let info = peer.request("cp_info", Value::Null, TEST_WAIT).await.unwrap();

    // THEN: Both succeed with the expected payloads
    assert_eq!(test.data(), Some(&json!(TEST_EVENT_ACK)));
    assert_eq!(
        info.data(),
        Some(&json!({"cp_id": "CP-0042", "site": "North Plant"}))
    );
    assert_eq!(manager.peer_info().await, Some(peer_info()));
}

/// **VALUE**: Verifies `cp_info` fails cleanly on a direct session without peer info.
#[tokio::test]
async fn given_direct_session_when_cp_info_requested_then_failure_answer() {
    let server = start_peer_server().await;
    let manager = new_manager(direct_settings());
    manager
        .connect(ConnectTarget::Direct(server_address(&server)))
        .await
        .unwrap();
    let peer = accept_control_point(&server).await;

    let info = peer.request("cp_info", Value::Null, TEST_WAIT).await.unwrap();

    assert!(!info.is_success());
    assert!(info.error().is_some());
}

/// **VALUE**: Verifies disconnect then reconnect restores Connected and keeps peer info.
///
/// **WHY THIS MATTERS**: After a network blip the operator reconnects without
/// re-entering the control point identity.
///
/// **BUG THIS CATCHES**: Would catch:
/// - PeerInfo dropped on disconnect
/// - Handlers lost across the reconnect
#[tokio::test]
async fn given_disconnected_session_when_reconnected_then_connected_with_same_peer_info() {
    // GIVEN: A discovered session that has been disconnected
    let server = start_peer_server().await;
    let manager = new_manager(loopback_settings(&server));
    manager
        .connect(ConnectTarget::Discover(peer_info()))
        .await
        .unwrap();
    let _first = accept_control_point(&server).await;
    manager.disconnect().await;
    assert_eq!(manager.status().await.state, ConnectionState::Disconnected);

    // WHEN: Reconnecting
    manager.reconnect().await.unwrap();

    // THEN: Connected again, and the new connection still serves the same info
    assert!(manager.status().await.is_connected());
    let peer = accept_control_point(&server).await;
    let info = peer.request("cp_info", Value::Null, TEST_WAIT).await.unwrap();
    assert_eq!(info.data(), Some(&json!({"cp_id": "CP-0042", "site": "North Plant"})));
}

/// **VALUE**: Verifies the device closing the channel flips the status.
#[tokio::test]
async fn given_connected_session_when_device_closes_then_status_disconnected() {
    let server = start_peer_server().await;
    let manager = new_manager(direct_settings());
    manager
        .connect(ConnectTarget::Direct(server_address(&server)))
        .await
        .unwrap();
    let peer = accept_control_point(&server).await;
    let mut changes = manager.subscribe_status();

    peer.close();

    let status = wait_for_status(&mut changes, |status: &ConnectionStatus| {
        status.state == ConnectionState::Disconnected
    })
    .await;
    assert_eq!(status.error, None);
}

/// **VALUE**: Verifies a session dropped by the device comes back Connected
/// on its own and still serves the same peer info.
///
/// **WHY THIS MATTERS**: Devices restart their socket during updates. The
/// control point must return without the operator re-entering its identity.
///
/// **BUG THIS CATCHES**: Would catch:
/// - Reconnect only happening through an explicit `reconnect()` call
/// - Status stuck on Disconnected after the channel reopened
/// - Handlers or PeerInfo lost across the reopened channel
#[tokio::test]
async fn given_device_drops_session_when_it_accepts_again_then_connected_with_same_peer_info() {
    // GIVEN: A discovered session watched from here on
    let server = start_peer_server().await;
    let manager = new_manager(loopback_settings(&server));
    manager
        .connect(ConnectTarget::Discover(peer_info()))
        .await
        .unwrap();
    let first = accept_control_point(&server).await;
    let mut changes = manager.subscribe_status();

    // WHEN: The device drops the connection and keeps listening
    first.close();

    // THEN: Disconnected, then Connected again without any call from us
    wait_for_status(&mut changes, |status: &ConnectionStatus| {
        status.state == ConnectionState::Disconnected
    })
    .await;
    let restored = wait_for_status(&mut changes, |status: &ConnectionStatus| {
        status.state == ConnectionState::Connected
    })
    .await;
    assert_eq!(restored.error, None);

    let second = accept_control_point(&server).await;
    let info = second.request("cp_info", Value::Null, TEST_WAIT).await.unwrap();
    assert_eq!(info.data(), Some(&json!({"cp_id": "CP-0042", "site": "North Plant"})));
    assert_eq!(manager.peer_info().await, Some(peer_info()));
}

/// **VALUE**: Verifies a device that stops listening leaves the session
/// Disconnected with the reconnect error.
#[tokio::test]
async fn given_device_gone_when_session_dropped_then_disconnected_with_error() {
    let server = start_peer_server().await;
    let address = server_address(&server);
    let manager = new_manager(direct_settings());
    manager
        .connect(ConnectTarget::Direct(address.clone()))
        .await
        .unwrap();
    let peer = accept_control_point(&server).await;
    let mut changes = manager.subscribe_status();
    server.shutdown();
    wait_until_refused(&address).await;

    peer.close();

    let status = wait_for_status(&mut changes, |status: &ConnectionStatus| {
        status.error.is_some()
    })
    .await;
    assert_eq!(status.state, ConnectionState::Disconnected);
}

/// **VALUE**: Verifies reconnect without a session is a no-op.
#[tokio::test]
async fn given_no_session_when_reconnecting_then_nothing_happens() {
    let manager = new_manager(direct_settings());
    let mut changes = manager.subscribe_status();

    manager.reconnect().await.unwrap();

    assert!(changes.try_recv().is_err());
    assert_eq!(manager.status().await, ConnectionStatus::default());
}

/// **VALUE**: Verifies connecting again replaces the previous session.
#[tokio::test]
async fn given_active_session_when_connecting_again_then_new_session_replaces_old() {
    let server = start_peer_server().await;
    let manager = new_manager(direct_settings());
    manager
        .connect(ConnectTarget::Direct(server_address(&server)))
        .await
        .unwrap();
    let first_id = manager.session_id().await;
    let first_peer = accept_control_point(&server).await;
    let mut first_lifecycle = first_peer.lifecycle();

    manager
        .connect(ConnectTarget::Direct(server_address(&server)))
        .await
        .unwrap();

    assert_ne!(manager.session_id().await, first_id);
    let _second_peer = accept_control_point(&server).await;
    let ended = tokio::time::timeout(TEST_WAIT, first_lifecycle.recv()).await;
    assert!(ended.is_ok(), "Old connection was not closed");
    assert!(manager.status().await.is_connected());
}
