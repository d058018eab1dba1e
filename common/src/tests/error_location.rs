use crate::ErrorLocation;
use std::panic::Location;

/// **VALUE**: Verifies `ErrorLocation::from()` captures the calling file and position.
///
/// **WHY THIS MATTERS**: Every error in the workspace carries one of these;
/// a wrong file or line sends whoever reads the log to the wrong place.
///
/// **BUG THIS CATCHES**: Would catch file, line or column not being copied
/// from the panic location.
#[test]
fn given_caller_location_when_error_location_created_then_captures_file_line_column() {
    // GIVEN / WHEN: A location captured right here
    let location = ErrorLocation::from(Location::caller());

    // THEN: It points into this test file
    assert!(location.file.ends_with("error_location.rs"), "{}", location.file);
    assert!(location.line > 0);
    assert!(location.column > 0);
}

/// **VALUE**: Verifies the display form is `[file:line:column]`.
///
/// **BUG THIS CATCHES**: Would catch brackets or separators changing, which
/// breaks every rendered error message.
#[test]
fn given_location_when_displayed_then_renders_file_line_column() {
    let location = ErrorLocation {
        file: "src/session/mod.rs",
        line: 42,
        column: 7,
    };

    assert_eq!(location.to_string(), "[src/session/mod.rs:42:7]");
}
