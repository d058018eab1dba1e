use crate::helpers::{
    TEST_CHANNEL_TIMEOUT, TEST_WAIT, connected_pair, eventually, server_address, start_peer_server,
};

use link_core::channel::{ChannelOptions, DuplexChannel};
use link_core::error::{ChannelError, PeerError};
use link_core::wire::answer_event;

use std::time::Duration;

use serde_json::{Value, json};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::http::StatusCode;

/// **VALUE**: Verifies connections without a known identity are refused during the handshake.
///
/// **WHY THIS MATTERS**: The device only talks to probes and control points;
/// anything else must not get a channel.
///
/// **BUG THIS CATCHES**: Would catch:
/// - Accepting unidentified clients as control points
/// - The refusal surfacing as a generic connect error on the client
#[tokio::test]
async fn given_unknown_identity_when_connecting_then_refused_with_bad_request() {
    let server = start_peer_server().await;

    for query in ["", "?identity=ADMIN"] {
        let url = format!("ws://{}/{query}", server_address(&server));

        let err = connect_async(url.as_str())
            .await
            .err()
            .expect("Handshake should be refused");

        assert!(
            matches!(&err, WsError::Http(response) if response.status() == StatusCode::BAD_REQUEST),
            "Expected HTTP 400 for '{query}', got {err}"
        );
        assert!(matches!(
            ChannelError::from(err),
            ChannelError::IdentityRejected { .. }
        ));
    }
}

/// **VALUE**: Verifies probes are counted and not handed out as control points.
#[tokio::test]
async fn given_probe_when_connected_then_counted_not_queued() {
    let server = start_peer_server().await;
    let probe = DuplexChannel::new(
        &server_address(&server),
        ChannelOptions::probe(TEST_CHANNEL_TIMEOUT),
    )
    .unwrap();

    probe.connect().await.unwrap();
    eventually(|| server.probes_open() == 1, "probe to be registered").await;
    probe.disconnect().await;

    eventually(|| server.probes_open() == 0, "probe to close").await;
    assert_eq!(server.probes_seen(), 1);
    let queued =
        tokio::time::timeout(Duration::from_millis(200), server.next_control_point()).await;
    assert!(queued.is_err(), "Probe was queued as a control point");
}

/// **VALUE**: Verifies a request without an answer times out.
///
/// **BUG THIS CATCHES**: Would catch a request that waits forever on a
/// control point without a handler.
#[tokio::test]
async fn given_no_handler_when_requested_then_answer_timeout() {
    let server = start_peer_server().await;
    let (_channel, peer) = connected_pair(&server).await;

    let result = peer
        .request("cp_info", Value::Null, Duration::from_millis(200))
        .await;

    assert!(matches!(result, Err(PeerError::AnswerTimeout { .. })));
}

/// **VALUE**: Verifies a malformed answer envelope is rejected.
///
/// **WHY THIS MATTERS**: A successful answer carrying an error would be
/// ambiguous; decoding refuses it.
#[tokio::test]
async fn given_contradictory_answer_when_requested_then_invalid_answer() {
    // GIVEN: A control point that answers with success and an error at once
    let server = start_peer_server().await;
    let (channel, peer) = connected_pair(&server).await;
    let mut requests = channel.on("cp_info");
    let responder = tokio::spawn(async move {
        if requests.recv().await.is_some() {
            channel
                .emit(
                    &answer_event("cp_info"),
                    json!({"event": "cp_info", "success": true, "error": "both"}),
                )
                .await
                .unwrap();
        }
        channel
    });

    // WHEN: Requesting
    let result = peer.request("cp_info", Value::Null, TEST_WAIT).await;

    // THEN: The answer is refused
    assert!(matches!(result, Err(PeerError::InvalidAnswer { .. })));
    let _channel = responder.await.unwrap();
}

/// **VALUE**: Verifies sending on a closed connection fails.
#[tokio::test]
async fn given_closed_control_point_when_sending_then_send_error() {
    let server = start_peer_server().await;
    let (channel, peer) = connected_pair(&server).await;
    let mut lifecycle = peer.lifecycle();

    channel.disconnect().await;
    let _ = tokio::time::timeout(TEST_WAIT, lifecycle.recv()).await;

    assert!(!peer.is_connected());
    assert!(matches!(
        peer.send("is_online", Value::Null),
        Err(PeerError::Send { .. })
    ));
}

/// **VALUE**: Verifies a channel cannot be built for an empty address.
#[test]
fn given_empty_address_when_channel_built_then_invalid_address() {
    let result = DuplexChannel::new("", ChannelOptions::default());

    assert!(matches!(result, Err(ChannelError::InvalidAddress { .. })));
}
