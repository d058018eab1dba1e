// Unit tests for channel addressing and frame fan-out.

use crate::channel::listeners::ListenerTable;
use crate::channel::{ChannelOptions, DuplexChannel, channel_url, deliver_text, lock_listeners};
use crate::error::channel::ChannelError;
use crate::wire::ConnectionIdentity;

use std::sync::Mutex as StdMutex;
use std::time::Duration;

use serde_json::{Value, json};

/// **VALUE**: Verifies the channel URL carries the identity query.
///
/// **WHY THIS MATTERS**: The device sorts connections by this parameter;
/// a probe sent as `CP` would be queued as a control point.
#[test]
fn given_host_and_port_when_url_built_then_carries_identity_query() {
    let url = channel_url("192.168.1.20:8988", ConnectionIdentity::Test).unwrap();

    assert_eq!(url.as_str(), "ws://192.168.1.20:8988/?identity=TEST");
}

#[test]
fn given_empty_address_when_url_built_then_invalid_address() {
    let result = channel_url("", ConnectionIdentity::ControlPoint);

    assert!(matches!(result, Err(ChannelError::InvalidAddress { .. })));
}

/// **VALUE**: Verifies probes never reconnect while control points do.
///
/// **BUG THIS CATCHES**: Would catch a probe reopening its socket after a
/// scan, leaving connections open on every host of the subnet.
#[test]
fn given_probe_options_when_built_then_reconnection_disabled() {
    let options = ChannelOptions::probe(Duration::from_millis(250));

    assert_eq!(options.identity, ConnectionIdentity::Test);
    assert!(!options.reconnection);
    assert!(ChannelOptions::default().reconnection);
}

#[tokio::test]
async fn given_unconnected_channel_when_emit_then_not_connected() {
    let channel = DuplexChannel::new("127.0.0.1:9", ChannelOptions::default()).unwrap();

    let result = channel.emit("test_event", Value::Null).await;

    assert!(matches!(result, Err(ChannelError::NotConnected { .. })));
}

#[tokio::test]
async fn given_unconnected_channel_when_disconnect_then_no_lifecycle_event() {
    let channel = DuplexChannel::new("127.0.0.1:9", ChannelOptions::default()).unwrap();
    let mut lifecycle = channel.lifecycle();

    channel.disconnect().await;

    assert!(lifecycle.try_recv().is_err());
}

#[test]
fn given_listeners_when_off_called_then_all_removed() {
    // GIVEN: One persistent and one one-shot listener
    let channel = DuplexChannel::new("127.0.0.1:9", ChannelOptions::default()).unwrap();
    let _persistent = channel.on("cp_info");
    let _once = channel.once("cp_info");
    assert_eq!(channel.listener_count("cp_info"), 2);

    // WHEN: Removing the event
    channel.off("cp_info");

    // THEN: Nothing is left
    assert_eq!(channel.listener_count("cp_info"), 0);
}

/// **VALUE**: Verifies a frame reaches persistent listeners every time and
/// one-shot listeners once.
///
/// **BUG THIS CATCHES**: Would catch a one-shot listener kept after firing,
/// which would swallow the next answer of the same name.
#[test]
fn given_text_frame_when_delivered_then_persistent_and_once_listeners_receive() {
    // GIVEN: Both kinds of listener on one event
    let table = StdMutex::new(ListenerTable::default());
    let mut persistent = lock_listeners(&table).on("test_event");
    let mut once = lock_listeners(&table).once("test_event");

    // WHEN: Two frames arrive
    deliver_text(&table, r#"{"event":"test_event","data":{"data":1}}"#, "test");
    deliver_text(&table, r#"{"event":"test_event","data":2}"#, "test");

    // THEN: Persistent sees both, once only the first
    assert_eq!(persistent.try_recv().unwrap(), json!({"data": 1}));
    assert_eq!(persistent.try_recv().unwrap(), json!(2));
    assert_eq!(once.try_recv().unwrap(), json!({"data": 1}));
    assert_eq!(lock_listeners(&table).listener_count("test_event"), 1);
}

#[test]
fn given_malformed_text_when_delivered_then_dropped() {
    let table = StdMutex::new(ListenerTable::default());
    let mut persistent = lock_listeners(&table).on("test_event");

    deliver_text(&table, "not json", "test");

    assert!(persistent.try_recv().is_err());
}
