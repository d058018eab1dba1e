use crate::helpers::{TEST_WAIT, connected_pair, start_peer_server};

use link_core::error::HandlerError;
use link_core::rpc::register_handler;
use link_core::wire::{EventEnvelope, answer_event};

use common::ErrorLocation;

use std::panic::Location;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::time::timeout;

/// **VALUE**: Verifies a handler's result comes back as a successful answer.
///
/// **WHY THIS MATTERS**: This is the request/answer contract the device relies on:
/// invoke `E`, wait for `E:answer`.
///
/// **BUG THIS CATCHES**: Would catch:
/// - Answers emitted under the request name instead of `E:answer`
/// - The handler receiving the whole envelope instead of its `data`
#[tokio::test]
async fn given_registered_handler_when_requested_then_success_answer() {
    // GIVEN: An echo handler on a connected channel
    let server = start_peer_server().await;
    let (channel, peer) = connected_pair(&server).await;
    let _task = register_handler(&channel, "echo", |payload: Value| async move {
        Ok::<Value, HandlerError>(json!({ "echo": payload }))
    });

    // WHEN: The device invokes it
    let answer = peer.request("echo", json!(42), TEST_WAIT).await.unwrap();

    // THEN: Success with the handler's value and no error
    assert_eq!(answer.event(), "echo");
    assert!(answer.is_success());
    assert_eq!(answer.data(), Some(&json!({"echo": 42})));
    assert_eq!(answer.error(), None);
}

/// **VALUE**: Verifies a failing handler produces a failed answer with the message only.
///
/// **BUG THIS CATCHES**: Would catch:
/// - No answer at all on failure (the device would hang until timeout)
/// - Source locations leaking into the message shown on the device
/// - A failed answer that still carries data
#[tokio::test]
async fn given_failing_handler_when_requested_then_failure_answer_without_data() {
    let server = start_peer_server().await;
    let (channel, peer) = connected_pair(&server).await;
    let _task = register_handler(&channel, "backup_db", |_: Value| async move {
        Err::<Value, _>(HandlerError::Failed {
            message: "database is locked".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })
    });

    let answer = peer.request("backup_db", Value::Null, TEST_WAIT).await.unwrap();

    assert!(!answer.is_success());
    assert_eq!(answer.error(), Some("database is locked"));
    assert_eq!(answer.data(), None);
}

/// **VALUE**: Verifies a panicking handler still answers, and the handler keeps serving.
///
/// **WHY THIS MATTERS**: A panic must not kill the subscription; the next
/// request on the same event still needs its answer.
#[tokio::test]
async fn given_panicking_handler_when_requested_twice_then_two_failure_answers() {
    let server = start_peer_server().await;
    let (channel, peer) = connected_pair(&server).await;
    let _task = register_handler(&channel, "upload_db", |payload: Value| async move {
        if payload == json!("boom") {
            panic!("import exploded");
        }
        Ok::<Value, HandlerError>(Value::Null)
    });

    let first = peer.request("upload_db", json!("boom"), TEST_WAIT).await.unwrap();
    let second = peer.request("upload_db", json!("fine"), TEST_WAIT).await.unwrap();

    assert!(!first.is_success());
    assert_eq!(first.error(), Some("import exploded"));
    assert!(second.is_success());
}

/// **VALUE**: Verifies exactly one answer per request, in arrival order.
///
/// **WHY THIS MATTERS**: Answers are matched by event name only, so a
/// duplicate or reordered answer would be taken as the reply to another request.
///
/// **BUG THIS CATCHES**: Would catch:
/// - Duplicate answers from overlapping subscriptions
/// - Concurrent handling that reorders answers of one event
#[tokio::test]
async fn given_burst_of_requests_when_handled_then_one_ordered_answer_each() {
    // GIVEN: A handler whose latency decreases with the payload
    let server = start_peer_server().await;
    let (channel, peer) = connected_pair(&server).await;
    let _task = register_handler(&channel, "slow", |payload: Value| async move {
        let delay = 40 - payload.as_u64().unwrap_or(0) * 10;
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok::<Value, HandlerError>(payload)
    });
    let mut answers = peer.on(&answer_event("slow"));

    // WHEN: Three requests are sent back to back
    for n in 1..=3 {
        let request = serde_json::to_value(EventEnvelope::request("slow", json!(n))).unwrap();
        peer.send("slow", request).unwrap();
    }

    // THEN: Three answers, in request order, then nothing else
    for expected in 1..=3 {
        let raw = timeout(TEST_WAIT, answers.recv()).await.unwrap().unwrap();
        let envelope: EventEnvelope = serde_json::from_value(raw).unwrap();
        assert_eq!(envelope.data(), Some(&json!(expected)));
    }
    let extra = timeout(Duration::from_millis(200), answers.recv()).await;
    assert!(extra.is_err(), "Unexpected extra answer: {extra:?}");
}

/// **VALUE**: Verifies a request without a `data` field reaches the handler as null.
#[tokio::test]
async fn given_request_without_data_when_handled_then_payload_is_null() {
    let server = start_peer_server().await;
    let (channel, peer) = connected_pair(&server).await;
    let _task = register_handler(&channel, "test_event", |payload: Value| async move {
        Ok::<Value, HandlerError>(json!(payload.is_null()))
    });
    let mut answers = peer.on(&answer_event("test_event"));

    peer.send("test_event", json!({"event": "test_event"})).unwrap();

    let raw = timeout(TEST_WAIT, answers.recv()).await.unwrap().unwrap();
    let envelope: EventEnvelope = serde_json::from_value(raw).unwrap();
    assert_eq!(envelope.data(), Some(&json!(true)));
}
