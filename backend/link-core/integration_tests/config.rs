use link_core::config::ServiceToolConfig;
use link_core::error::ConfigError;
use link_core::{DEFAULT_BIND_ADDRESS, DEFAULT_PORT};

use std::path::PathBuf;
use std::time::Duration;

/// **VALUE**: Verifies a missing config file yields defaults instead of an error.
///
/// **WHY THIS MATTERS**: First run has no config; the tool must still start
/// on port 8988.
#[test]
fn given_empty_dir_when_loading_then_defaults() {
    let dir = tempfile::tempdir().unwrap();

    let config = ServiceToolConfig::load(dir.path()).unwrap();

    assert_eq!(config, ServiceToolConfig::default());
    assert_eq!(config.network.port, DEFAULT_PORT);
    assert_eq!(config.peer.bind_address, DEFAULT_BIND_ADDRESS);
}

/// **VALUE**: Verifies saved config loads back identically.
///
/// **BUG THIS CATCHES**: Would catch fields skipped on save or renamed
/// between save and load.
#[test]
fn given_saved_config_when_loaded_then_identical() {
    // GIVEN: A customized config saved to disk
    let dir = tempfile::tempdir().unwrap();
    let mut config = ServiceToolConfig::default();
    config.network.port = 9100;
    config.network.local_address = Some("10.20.30.40".to_string());
    config.backup.data_export_path = Some(PathBuf::from("/var/lib/cp/data.db"));
    config.save(dir.path()).unwrap();

    // WHEN: Loading it
    let loaded = ServiceToolConfig::load(dir.path()).unwrap();

    // THEN: Same values, and no temp file left behind
    assert_eq!(loaded, config);
    assert!(!dir.path().join("config.json.tmp").exists());
}

/// **VALUE**: Verifies a partial file fills the rest with defaults.
#[test]
fn given_partial_file_when_loading_then_missing_fields_defaulted() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("config.json"), r#"{"network": {"port": 9000}}"#).unwrap();

    let config = ServiceToolConfig::load(dir.path()).unwrap();

    assert_eq!(config.network.port, 9000);
    assert_eq!(config.network.probe_timeout_ms, 5_000);
    assert_eq!(config.version, 1);
}

/// **VALUE**: Verifies corrupted JSON is reported, not silently replaced.
#[test]
fn given_corrupted_file_when_loading_then_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("config.json"), "{ not json").unwrap();

    let result = ServiceToolConfig::load(dir.path());

    assert!(matches!(result, Err(ConfigError::ParseError { .. })));
}

/// **VALUE**: Verifies out-of-range values are rejected.
#[test]
fn given_invalid_values_when_validated_then_validation_error() {
    let mut zero_port = ServiceToolConfig::default();
    zero_port.network.port = 0;

    let mut tiny_timeout = ServiceToolConfig::default();
    tiny_timeout.network.probe_timeout_ms = 1;

    let mut bad_address = ServiceToolConfig::default();
    bad_address.network.local_address = Some("localhost".to_string());

    let mut future_version = ServiceToolConfig::default();
    future_version.version = 99;

    for config in [zero_port, tiny_timeout, bad_address, future_version] {
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError { .. })
        ));
    }
}

/// **VALUE**: Verifies an invalid config is not written.
#[test]
fn given_invalid_config_when_saving_then_nothing_written() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ServiceToolConfig::default();
    config.peer.bind_address = String::new();

    let result = config.save(dir.path());

    assert!(result.is_err());
    assert!(!dir.path().join("config.json").exists());
}

/// **VALUE**: Verifies config values reach the session settings.
#[test]
fn given_config_when_session_settings_built_then_values_carried() {
    let mut config = ServiceToolConfig::default();
    config.network.port = 9200;
    config.network.probe_timeout_ms = 750;
    config.network.local_address = Some("192.168.5.5".to_string());

    let settings = config.session_settings();

    assert_eq!(settings.port, 9200);
    assert_eq!(settings.channel_timeout, Duration::from_millis(750));
    assert_eq!(settings.local_address.as_deref(), Some("192.168.5.5"));
    assert_eq!(config.answer_timeout(), Duration::from_secs(60));
}
