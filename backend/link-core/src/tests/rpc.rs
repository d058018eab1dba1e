// Unit tests for turning handler outcomes into answer envelopes.

use crate::error::handler::HandlerError;
use crate::rpc::invoke;

use common::ErrorLocation;

use std::panic::Location;

use serde_json::{Value, json};

#[tokio::test]
async fn given_ok_handler_when_invoked_then_success_envelope() {
    let handler = |payload: Value| async move {
        Ok::<Value, HandlerError>(json!({ "echo": payload }))
    };

    let envelope = invoke("test_event", &handler, json!(3)).await;

    assert!(envelope.is_success());
    assert_eq!(envelope.data(), Some(&json!({"echo": 3})));
    assert_eq!(envelope.error(), None);
}

/// **VALUE**: Verifies a failing handler yields `success: false` with only the error.
///
/// **BUG THIS CATCHES**: Would catch the error location leaking into the
/// message shown on the device, or `data` sent alongside `error`.
#[tokio::test]
async fn given_failing_handler_when_invoked_then_failure_envelope_without_data() {
    // GIVEN: A handler that always fails
    let handler = |_: Value| async move {
        Err::<Value, _>(HandlerError::Failed {
            message: "db locked".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })
    };

    // WHEN: Invoked
    let envelope = invoke("backup_db", &handler, Value::Null).await;

    // THEN: Failure with the bare message
    assert!(!envelope.is_success());
    assert_eq!(envelope.error(), Some("db locked"));
    assert_eq!(envelope.data(), None);
}

/// **VALUE**: Verifies a panicking handler still produces a failure envelope.
///
/// **WHY THIS MATTERS**: The device waits for exactly one answer per
/// request; a panic that skipped the answer would hang it.
#[tokio::test]
async fn given_panicking_handler_when_invoked_then_failure_envelope() {
    let handler = |_: Value| async move {
        if true {
            panic!("export exploded");
        }
        Ok::<Value, HandlerError>(Value::Null)
    };

    let envelope = invoke("backup_db", &handler, Value::Null).await;

    assert!(!envelope.is_success());
    assert_eq!(envelope.error(), Some("export exploded"));
}
