// Unit tests for command line parsing and config overrides

use crate::cli::{BackupKind, Cli, Command};

use link_core::backup::DbExportKind;
use link_core::config::ServiceToolConfig;

use std::path::PathBuf;

use clap::Parser;

/// **VALUE**: Verifies the discovery subcommand takes the announced identity.
#[test]
fn given_connect_args_when_parsed_then_connect_command() {
    let cli = Cli::try_parse_from([
        "service-tool",
        "connect",
        "--cp-id",
        "CP-7",
        "--site",
        "Depot",
    ])
    .unwrap();

    assert_eq!(
        cli.command,
        Command::Connect {
            cp_id: "CP-7".to_string(),
            site: "Depot".to_string(),
            local_address: None,
        }
    );
}

/// **VALUE**: Verifies `connect` refuses to run without the identity fields.
///
/// **BUG THIS CATCHES**: Would catch making `--cp-id` optional, which lets a
/// session start that cannot answer `cp_info`.
#[test]
fn given_connect_without_cp_id_when_parsed_then_error() {
    let result = Cli::try_parse_from(["service-tool", "connect", "--site", "Depot"]);

    assert!(result.is_err());
}

/// **VALUE**: Verifies `--output` only makes sense with `--backup`.
#[test]
fn given_output_without_backup_when_parsed_then_error() {
    let result = Cli::try_parse_from(["service-tool", "serve", "--output", "backup.zip"]);

    assert!(result.is_err());
}

/// **VALUE**: Verifies backup kinds map onto export kinds.
#[test]
fn given_serve_with_logs_backup_when_parsed_then_log_export() {
    let cli = Cli::try_parse_from([
        "service-tool",
        "serve",
        "--backup",
        "logs",
        "--output",
        "logs.zip",
    ])
    .unwrap();

    match cli.command {
        Command::Serve { backup, output, .. } => {
            assert_eq!(backup, Some(BackupKind::Logs));
            assert_eq!(DbExportKind::from(BackupKind::Logs), DbExportKind::LogData);
            assert_eq!(output, Some(PathBuf::from("logs.zip")));
        }
        other => panic!("Expected serve, got {other:?}"),
    }
}

/// **VALUE**: Verifies command line values win over the config file.
///
/// **WHY THIS MATTERS**: Operators fix a wrong port or subnet from the
/// command line without editing config.json.
#[test]
fn given_port_and_local_address_when_applied_then_config_overridden() {
    // GIVEN: Defaults and a command line with overrides
    let mut config = ServiceToolConfig::default();
    let cli = Cli::try_parse_from([
        "service-tool",
        "--port",
        "9001",
        "connect",
        "--cp-id",
        "CP-7",
        "--site",
        "Depot",
        "--local-address",
        "10.9.8.7",
    ])
    .unwrap();

    // WHEN: Applying them
    cli.apply_overrides(&mut config);

    // THEN: Both values replaced
    assert_eq!(config.network.port, 9001);
    assert_eq!(config.network.local_address.as_deref(), Some("10.9.8.7"));
}

/// **VALUE**: Verifies `--port` moves the serve bind address when no `--bind` is given.
#[test]
fn given_serve_with_port_when_applied_then_bind_follows_port() {
    let mut config = ServiceToolConfig::default();
    let cli = Cli::try_parse_from(["service-tool", "serve", "--port", "9100"]).unwrap();

    cli.apply_overrides(&mut config);

    assert_eq!(config.peer.bind_address, "0.0.0.0:9100");
}

/// **VALUE**: Verifies repeated `-v` flags are counted anywhere on the line.
#[test]
fn given_repeated_verbose_flags_when_parsed_then_counted() {
    let cli =
        Cli::try_parse_from(["service-tool", "-vv", "attach", "10.0.0.5:8988", "-v"]).unwrap();

    assert_eq!(cli.verbose, 3);
    assert_eq!(
        cli.command,
        Command::Attach {
            address: "10.0.0.5:8988".to_string()
        }
    );
}

#[test]
fn given_no_verbose_flag_when_parsed_then_zero() {
    let cli = Cli::try_parse_from(["service-tool", "attach", "10.0.0.5:8988"]).unwrap();

    assert_eq!(cli.verbose, 0);
}
