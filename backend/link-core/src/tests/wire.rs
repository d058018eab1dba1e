// Unit tests for frame and envelope encoding.

use crate::wire::{ConnectionIdentity, EventEnvelope, WireEvent, answer_event};

use serde_json::{Value, json};

#[test]
fn given_event_name_when_answer_event_built_then_appends_suffix() {
    assert_eq!(answer_event("backup_db"), "backup_db:answer");
    assert_eq!(WireEvent::EventTest.answer_name(), "test_event:answer");
}

#[test]
fn given_wire_names_when_parsed_then_match_enum() {
    for event in WireEvent::ALL {
        assert_eq!(WireEvent::from_name(event.name()), Some(event));
    }
    assert_eq!(WireEvent::from_name("nope"), None);
}

#[test]
fn given_identity_strings_when_parsed_then_match_wire_values() {
    assert_eq!("TEST".parse(), Ok(ConnectionIdentity::Test));
    assert_eq!("CP".parse(), Ok(ConnectionIdentity::ControlPoint));
    assert!("cp".parse::<ConnectionIdentity>().is_err());
}

/// **VALUE**: Verifies a success answer carries `data` and no `error` key.
///
/// **WHY THIS MATTERS**: The device branches on which key is present.
#[test]
fn given_success_envelope_when_serialized_then_omits_error() {
    let envelope = EventEnvelope::success("cp_info", json!({"cp_id": "7"}));

    let value = serde_json::to_value(&envelope).unwrap();

    assert_eq!(
        value,
        json!({"event": "cp_info", "success": true, "data": {"cp_id": "7"}})
    );
}

#[test]
fn given_failure_envelope_when_serialized_then_omits_data() {
    let envelope = EventEnvelope::failure("backup_db", "disk gone");

    let value = serde_json::to_value(&envelope).unwrap();

    assert_eq!(
        value,
        json!({"event": "backup_db", "success": false, "error": "disk gone"})
    );
}

/// **VALUE**: Verifies envelopes mixing success and failure fields are rejected.
///
/// **BUG THIS CATCHES**: Would catch decoding `{success: true, error}` as a
/// success, hiding the failure from whoever sent the request.
#[test]
fn given_contradictory_envelope_when_deserialized_then_rejected() {
    // GIVEN: Envelopes with both outcomes, or failure plus data
    let both = json!({"event": "x", "success": true, "data": 1, "error": "e"});
    let failed_with_data = json!({"event": "x", "success": false, "data": 1});

    // WHEN / THEN: Neither decodes
    assert!(serde_json::from_value::<EventEnvelope>(both).is_err());
    assert!(serde_json::from_value::<EventEnvelope>(failed_with_data).is_err());
}

#[test]
fn given_inbound_without_data_when_request_payload_taken_then_null() {
    assert_eq!(EventEnvelope::request_payload(json!({"event": "x"})), Value::Null);
    assert_eq!(EventEnvelope::request_payload(json!("bare")), Value::Null);
    assert_eq!(
        EventEnvelope::request_payload(json!({"event": "x", "data": 1})),
        json!(1)
    );
}
