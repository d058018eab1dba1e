// Unit tests for logger initialization and verbosity levels

use crate::logger::{
    LOG_FILE_NAME, initialize, initialize_internal, level_for_verbosity, transport_level,
};

use std::path::PathBuf;

use log::LevelFilter;

/// **VALUE**: Verifies that calling initialize() multiple times doesn't panic or fail.
///
/// **WHY THIS MATTERS**: The binary and tests can both reach initialization.
/// Installing a second global logger would otherwise fail at startup.
///
/// **BUG THIS CATCHES**: Would catch if the Once or AtomicBool guards are removed,
/// causing fern to refuse a second global logger.
#[test]
fn given_logger_initialized_when_called_again_then_returns_ok() {
    // GIVEN: A valid temporary directory
    let temp_dir = tempfile::tempdir().unwrap();

    // WHEN: Calling initialize twice
    let result1 = initialize(temp_dir.path(), 0);
    let result2 = initialize(temp_dir.path(), 2);

    // THEN: Both return Ok
    assert!(result1.is_ok(), "First initialization should succeed");
    assert!(
        result2.is_ok(),
        "Second initialization should succeed (idempotent)"
    );
}

/// **VALUE**: Verifies an unusable log directory is an error, not a panic.
///
/// **WHY THIS MATTERS**: A read-only or bogus `--log-dir` must produce a clear
/// message before anything else runs.
///
/// **BUG THIS CATCHES**: Would catch if `fern::log_file()` were unwrapped.
#[test]
fn given_invalid_log_dir_when_initializing_then_returns_error() {
    // GIVEN: A path under a file, which can never be a directory
    let invalid_dir = PathBuf::from("/dev/null/invalid-path");

    // WHEN: Building the dispatch
    let result = initialize_internal(&invalid_dir, 0);

    // THEN: ServiceTool error naming the log file
    let err = result.expect_err("Should fail for invalid log directory");
    let err_string = format!("{err:?}");
    assert!(err_string.contains("ServiceTool"));
    assert!(err_string.contains(LOG_FILE_NAME));
}

/// **VALUE**: Verifies each `-v` raises the tool's own level.
#[test]
fn given_verbose_flags_when_mapped_then_debug_then_trace() {
    assert_eq!(level_for_verbosity(1), LevelFilter::Debug);
    assert_eq!(level_for_verbosity(2), LevelFilter::Trace);
    assert_eq!(level_for_verbosity(5), LevelFilter::Trace);
}

/// **VALUE**: Verifies the WebSocket stack stays at warn until `-vvv`.
///
/// **WHY THIS MATTERS**: A subnet scan opens 254 sockets; with the
/// transport at debug the tool's own lines disappear in handshake noise.
///
/// **BUG THIS CATCHES**: Would catch the transport targets following the
/// tool's level, or never being raised at all.
#[test]
fn given_verbosity_when_transport_level_chosen_then_capped_below_three_flags() {
    // GIVEN / WHEN / THEN: Capped for zero to two flags, uncapped from three
    assert_eq!(transport_level(0), LevelFilter::Warn);
    assert_eq!(transport_level(1), LevelFilter::Warn);
    assert_eq!(transport_level(2), LevelFilter::Warn);
    assert_eq!(transport_level(3), LevelFilter::Trace);
}
