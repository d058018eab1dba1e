use crate::helpers::{
    TEST_CHANNEL_TIMEOUT, TEST_WAIT, accept_control_point, connected_pair, server_address,
    start_peer_server, unused_address, wait_until_refused,
};

use link_core::channel::{ChannelEvent, ChannelOptions, DuplexChannel};
use link_core::error::ChannelError;

use serde_json::json;
use tokio::time::timeout;

/// **VALUE**: Verifies frames flow both ways between a channel and the device.
///
/// **WHY THIS MATTERS**: Every request and answer rides on named frames.
///
/// **BUG THIS CATCHES**: Would catch:
/// - Frames dispatched under the wrong event name
/// - Payloads lost or re-encoded on the way
#[tokio::test]
async fn given_connected_channel_when_frames_exchanged_then_both_sides_receive() {
    // GIVEN: A connected control point channel
    let server = start_peer_server().await;
    let (channel, peer) = connected_pair(&server).await;
    let mut at_channel = channel.on("is_online");
    let mut at_peer = peer.on("status");

    // WHEN: Each side emits a frame
    peer.send("is_online", json!({"online": true})).unwrap();
    channel.emit("status", json!([1, 2, 3])).await.unwrap();

    // THEN: The other side receives it with the payload intact
    let received = timeout(TEST_WAIT, at_channel.recv()).await.unwrap().unwrap();
    assert_eq!(received, json!({"online": true}));
    let received = timeout(TEST_WAIT, at_peer.recv()).await.unwrap().unwrap();
    assert_eq!(received, json!([1, 2, 3]));
}

/// **VALUE**: Verifies `Connect` then `Disconnect` are raised, and `Disconnect` once.
///
/// **BUG THIS CATCHES**: Would catch a double `Disconnect` when both the
/// local close and the reader ending report it.
#[tokio::test]
async fn given_connected_channel_when_disconnected_then_single_disconnect_event() {
    // GIVEN: A channel watched from before its first connect
    let server = start_peer_server().await;
    let channel = DuplexChannel::new(
        &server_address(&server),
        ChannelOptions::control_point(TEST_CHANNEL_TIMEOUT),
    )
    .unwrap();
    let mut lifecycle = channel.lifecycle();
    channel.connect().await.unwrap();
    let _peer = accept_control_point(&server).await;

    // WHEN: Disconnecting twice
    channel.disconnect().await;
    channel.disconnect().await;

    // THEN: Exactly Connect then Disconnect
    assert_eq!(lifecycle.recv().await.unwrap(), ChannelEvent::Connect);
    assert_eq!(lifecycle.recv().await.unwrap(), ChannelEvent::Disconnect);
    assert!(lifecycle.try_recv().is_err());
    assert!(!channel.is_connected());
}

/// **VALUE**: Verifies a close from the device is reported as `Disconnect`
/// and followed by an automatic reconnect.
///
/// **WHY THIS MATTERS**: The session status follows these events; a device
/// that restarts its socket must see the control point come back on its own.
///
/// **BUG THIS CATCHES**: Would catch:
/// - A dropped control point channel that stays closed until someone calls
///   `connect()` again
/// - Listeners lost across the reopened socket
#[tokio::test]
async fn given_peer_closes_when_watching_lifecycle_then_disconnect_then_reconnect() {
    // GIVEN: A connected control point channel with a listener
    let server = start_peer_server().await;
    let (channel, peer) = connected_pair(&server).await;
    let mut lifecycle = channel.lifecycle();
    let mut at_channel = channel.on("is_online");

    // WHEN: The device closes its side
    peer.close();

    // THEN: Disconnect, then Reconnect, and the new socket delivers frames
    let event = timeout(TEST_WAIT, lifecycle.recv()).await.unwrap().unwrap();
    assert_eq!(event, ChannelEvent::Disconnect);
    let event = timeout(TEST_WAIT, lifecycle.recv()).await.unwrap().unwrap();
    assert_eq!(event, ChannelEvent::Reconnect);
    assert!(channel.is_connected());

    let reopened = accept_control_point(&server).await;
    reopened.send("is_online", json!(true)).unwrap();
    let received = timeout(TEST_WAIT, at_channel.recv()).await.unwrap().unwrap();
    assert_eq!(received, json!(true));
}

/// **VALUE**: Verifies the automatic reconnect is a single attempt that
/// reports `ConnectError` when the device is gone.
#[tokio::test]
async fn given_device_gone_when_peer_closes_then_one_failed_reconnect() {
    // GIVEN: A connected channel whose device stops listening
    let server = start_peer_server().await;
    let address = server_address(&server);
    let (channel, peer) = connected_pair(&server).await;
    let mut lifecycle = channel.lifecycle();
    server.shutdown();
    wait_until_refused(&address).await;

    // WHEN: The device closes the last connection
    peer.close();

    // THEN: Disconnect, one ConnectError, and nothing more
    let event = timeout(TEST_WAIT, lifecycle.recv()).await.unwrap().unwrap();
    assert_eq!(event, ChannelEvent::Disconnect);
    let event = timeout(TEST_WAIT, lifecycle.recv()).await.unwrap().unwrap();
    assert!(matches!(event, ChannelEvent::ConnectError(_)), "{event:?}");
    tokio::time::sleep(TEST_CHANNEL_TIMEOUT).await;
    assert!(lifecycle.try_recv().is_err());
    assert!(!channel.is_connected());
}

/// **VALUE**: Verifies a local disconnect does not trigger the automatic reconnect.
#[tokio::test]
async fn given_local_disconnect_when_waiting_then_channel_stays_closed() {
    let server = start_peer_server().await;
    let (channel, _peer) = connected_pair(&server).await;
    let mut lifecycle = channel.lifecycle();

    channel.disconnect().await;
    tokio::time::sleep(TEST_CHANNEL_TIMEOUT).await;

    assert_eq!(lifecycle.recv().await.unwrap(), ChannelEvent::Disconnect);
    assert!(lifecycle.try_recv().is_err());
    assert!(!channel.is_connected());
}

/// **VALUE**: Verifies a second `connect()` after a disconnect raises `Reconnect`.
#[tokio::test]
async fn given_disconnected_channel_when_connected_again_then_reconnect_raised() {
    let server = start_peer_server().await;
    let (channel, _peer) = connected_pair(&server).await;
    channel.disconnect().await;
    let mut lifecycle = channel.lifecycle();

    channel.connect().await.unwrap();

    assert_eq!(lifecycle.recv().await.unwrap(), ChannelEvent::Reconnect);
    assert!(channel.is_connected());
}

/// **VALUE**: Verifies probe channels refuse to connect twice.
///
/// **BUG THIS CATCHES**: Would catch probe channels silently reconnecting,
/// which keeps sockets open on the device after a scan.
#[tokio::test]
async fn given_probe_channel_when_connected_twice_then_reconnect_disabled() {
    let server = start_peer_server().await;
    let channel = DuplexChannel::new(
        &server_address(&server),
        ChannelOptions::probe(TEST_CHANNEL_TIMEOUT),
    )
    .unwrap();
    channel.connect().await.unwrap();
    channel.disconnect().await;

    let result = channel.connect().await;

    assert!(matches!(result, Err(ChannelError::ReconnectDisabled { .. })));
}

/// **VALUE**: Verifies a failed connect both returns an error and raises `ConnectError`.
#[tokio::test]
async fn given_nothing_listening_when_connecting_then_connect_error() {
    let channel = DuplexChannel::new(
        &unused_address().await,
        ChannelOptions::control_point(TEST_CHANNEL_TIMEOUT),
    )
    .unwrap();
    let mut lifecycle = channel.lifecycle();

    let result = channel.connect().await;

    assert!(result.is_err());
    assert!(matches!(
        lifecycle.recv().await.unwrap(),
        ChannelEvent::ConnectError(_)
    ));
    assert!(!channel.is_connected());
}

/// **VALUE**: Verifies `once` fires a single time and `off` removes listeners.
#[tokio::test]
async fn given_once_and_on_listeners_when_frames_arrive_then_once_fires_once() {
    // GIVEN: One-shot and persistent listeners on the same event
    let server = start_peer_server().await;
    let (channel, peer) = connected_pair(&server).await;
    let first = channel.once("cp_info");
    let mut every = channel.on("cp_info");
    assert_eq!(channel.listener_count("cp_info"), 2);

    // WHEN: Two frames arrive
    peer.send("cp_info", json!(1)).unwrap();
    peer.send("cp_info", json!(2)).unwrap();

    // THEN: The one-shot saw only the first, the persistent one saw both
    assert_eq!(timeout(TEST_WAIT, first).await.unwrap().unwrap(), json!(1));
    assert_eq!(timeout(TEST_WAIT, every.recv()).await.unwrap().unwrap(), json!(1));
    assert_eq!(timeout(TEST_WAIT, every.recv()).await.unwrap().unwrap(), json!(2));
    assert_eq!(channel.listener_count("cp_info"), 1);

    channel.off("cp_info");
    assert_eq!(channel.listener_count("cp_info"), 0);
}
