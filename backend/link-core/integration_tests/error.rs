use link_core::error::{BackupError, CoreError, DiscoveryError, HandlerError, StoreError};

use common::ErrorLocation;

use std::error::Error;
use std::panic::Location;

/// **VALUE**: Verifies errors render their type, message and source location.
///
/// **WHY THIS MATTERS**: When a field connection fails, the log line is all
/// there is. The location pins it to the exact call site.
///
/// **BUG THIS CATCHES**: Would catch a Display format that drops the
/// location, or a `From` impl missing `#[track_caller]`.
#[test]
fn given_discovery_error_when_formatted_then_includes_location() {
    // GIVEN: A NotFound error created here
    let err = DiscoveryError::NotFound {
        message: "Service tool server was not found".to_string(),
        location: ErrorLocation::from(Location::caller()),
    };

    // WHEN: Formatting it
    let error_string = err.to_string();

    // THEN: Type, message and this file are all present
    assert!(error_string.contains("Server Not Found Error"));
    assert!(error_string.contains("Service tool server was not found"));
    assert!(error_string.contains("error.rs"));
}

/// **VALUE**: Verifies the peer-facing message of a handler error has no location.
///
/// **WHY THIS MATTERS**: Answers are shown on the device; source paths are noise there.
#[test]
fn given_wrapped_backup_error_when_answer_message_taken_then_message_only() {
    let err = HandlerError::from(BackupError::InvalidInput {
        message: "Backup payload is empty".to_string(),
        location: ErrorLocation::from(Location::caller()),
    });

    assert_eq!(err.answer_message(), "Backup payload is empty");
    assert!(err.to_string().contains("error.rs"));
}

/// **VALUE**: Verifies the store failure stays reachable as the export error's source.
#[test]
fn given_export_error_when_source_taken_then_store_error() {
    let err = BackupError::Export {
        message: "database is locked".to_string(),
        location: ErrorLocation::from(Location::caller()),
        source: StoreError::other("database is locked"),
    };

    let source = err.source().expect("Export error should have a source");

    assert!(source.to_string().contains("Store Error"));
}

/// **VALUE**: Verifies the aggregate error is transparent over domain errors.
#[test]
fn given_domain_error_when_wrapped_in_core_error_then_display_unchanged() {
    let err = DiscoveryError::InvalidInput {
        message: "'localhost' is not a dotted network address".to_string(),
        location: ErrorLocation::from(Location::caller()),
    };
    let expected = err.to_string();

    let core = CoreError::from(err);

    assert_eq!(core.to_string(), expected);
}
