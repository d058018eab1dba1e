// Unit tests for error module
// Tests serialization and conversions from core errors

use crate::error::ServiceToolError;

use common::ErrorLocation;

use link_core::error::{ConfigError, ConnectError, DiscoveryError};

use std::panic::Location;

/// **VALUE**: Tests that errors serialize with a type tag.
///
/// **WHY THIS MATTERS**: Errors are reported as JSON to whatever front end
/// drives the tool; an opaque string would lose the variant.
///
/// **BUG THIS CATCHES**: Would catch removing `#[derive(Serialize)]` or the
/// `tag`/`content` attributes.
#[test]
fn given_service_tool_error_when_serialized_then_tagged_json() {
    // GIVEN: A RequestFailed error
    let err = ServiceToolError::RequestFailed {
        message: String::from("'backup_db' failed: database is locked"),
        location: ErrorLocation::from(Location::caller()),
    };

    // WHEN: Serializing to JSON
    let json = serde_json::to_value(&err).unwrap();

    // THEN: Variant name as tag, fields under data
    assert_eq!(json["type"], "RequestFailed");
    assert_eq!(json["data"]["message"], "'backup_db' failed: database is locked");
    assert!(json["data"]["location"]["file"].is_string());
}

/// **VALUE**: Verifies a connect failure keeps the core message.
#[test]
fn given_connect_error_when_converted_then_core_variant_with_message() {
    let core = ConnectError::from(DiscoveryError::NotFound {
        message: "Service tool server was not found".to_string(),
        location: ErrorLocation::from(Location::caller()),
    });

    let err = ServiceToolError::from(core);

    match err {
        ServiceToolError::Core { message, .. } => {
            assert!(message.contains("Service tool server was not found"));
        }
        other => panic!("Expected Core variant, got {other:?}"),
    }
}

/// **VALUE**: Verifies config failures get their own variant.
#[test]
fn given_config_error_when_converted_then_config_variant() {
    let err = ServiceToolError::from(ConfigError::ValidationError {
        location: ErrorLocation::from(Location::caller()),
        reason: "network.port cannot be 0".to_string(),
    });

    assert!(matches!(err, ServiceToolError::Config { .. }));
    assert!(err.to_string().contains("network.port cannot be 0"));
}
