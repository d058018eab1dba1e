//! Dual output logging (colored stdout + log file) with one-time initialization.
//!
//! The WebSocket stack logs every frame and handshake at debug level, which
//! drowns the tool's own output during a 254-host scan. Its targets stay at
//! warn unless the operator asks for the most verbose level.

use crate::error::ServiceToolError;

use common::ErrorLocation;

use std::io::stdout;
use std::panic::Location;
use std::path::Path;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use fern::Dispatch;
use fern::colors::Color::{Blue, Green, Magenta, Red, Yellow};
use fern::colors::ColoredLevelConfig;
use humantime::format_rfc3339;
use log::{LevelFilter, info, warn};

/// Thread-safe initialization guard.
static INIT_LOGGER_ONCE: Once = Once::new();

/// Tracks if logger initialization was already attempted.
static LOGGER_ALREADY_CALLED: AtomicBool = AtomicBool::new(false);

pub const LOG_FILE_NAME: &str = "service-tool.log";

const LOGGER_INITIALIZED_MESSAGE_PREFIX: &str = "Logger initialized with level: ";
const LOGGER_ALREADY_INITIALIZED_MESSAGE: &str = "Logger already initialized";

#[cfg(debug_assertions)]
const LOG_LEVEL: LevelFilter = LevelFilter::Debug;

#[cfg(not(debug_assertions))]
const LOG_LEVEL: LevelFilter = LevelFilter::Info;

/// Log targets of the WebSocket stack.
pub const TRANSPORT_TARGETS: [&str; 2] = ["tungstenite", "tokio_tungstenite"];

/// `-v` count at which the transport targets are no longer capped.
const TRANSPORT_VERBOSITY: u8 = 3;

/// Level for the tool's own targets after `verbose` `-v` flags.
///
/// One flag shows debug output, two or more add per-probe and per-frame
/// trace lines.
pub fn level_for_verbosity(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LOG_LEVEL,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Level for [`TRANSPORT_TARGETS`] after `verbose` `-v` flags.
pub fn transport_level(verbose: u8) -> LevelFilter {
    if verbose >= TRANSPORT_VERBOSITY {
        level_for_verbosity(verbose)
    } else {
        level_for_verbosity(verbose).min(LevelFilter::Warn)
    }
}

/// Initialize the logger with dual output (stdout + `service-tool.log`) at
/// the level chosen by `verbose` `-v` flags.
///
/// Safe to call more than once: later calls log a warning and return Ok.
///
/// # Errors
///
/// Returns an error if the log file cannot be created or a global logger
/// is already installed.
pub fn initialize(log_dir: &Path, verbose: u8) -> Result<(), ServiceToolError> {
    if LOGGER_ALREADY_CALLED.swap(true, Ordering::SeqCst) {
        warn!("{LOGGER_ALREADY_INITIALIZED_MESSAGE}");
        return Ok(());
    }

    let mut result = Ok(());

    INIT_LOGGER_ONCE.call_once(|| {
        result = initialize_internal(log_dir, verbose);
        if result.is_ok() {
            info!(
                "{LOGGER_INITIALIZED_MESSAGE_PREFIX}{:?}",
                level_for_verbosity(verbose)
            );
        }
    });

    result
}

#[track_caller]
pub(crate) fn initialize_internal(log_dir: &Path, verbose: u8) -> Result<(), ServiceToolError> {
    let log_file_path = log_dir.join(LOG_FILE_NAME);

    let color_configuration = ColoredLevelConfig::new()
        .debug(Blue)
        .info(Green)
        .warn(Yellow)
        .error(Red)
        .trace(Magenta);

    let base_dispatch = TRANSPORT_TARGETS.into_iter().fold(
        Dispatch::new().level(level_for_verbosity(verbose)),
        |dispatch, target| dispatch.level_for(target, transport_level(verbose)),
    );

    let stdout_dispatch = Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{date} - {level}] {message} [{file}:{line}]",
                date = format_rfc3339(SystemTime::now()),
                level = color_configuration.color(record.level()),
                file = record.file().unwrap_or("unknown"),
                line = record.line().unwrap_or(0),
            ))
        })
        .chain(stdout());

    // Plain text, no colors
    let file_dispatch = Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{date} - {level}] {message} [{file}:{line}]",
                date = format_rfc3339(SystemTime::now()),
                level = record.level(),
                file = record.file().unwrap_or("unknown"),
                line = record.line().unwrap_or(0)
            ))
        })
        .chain(
            fern::log_file(&log_file_path).map_err(|e| ServiceToolError::ServiceTool {
                message: format!("Failed to create log file {}: {e}", log_file_path.display()),
                location: ErrorLocation::from(Location::caller()),
            })?,
        );

    base_dispatch
        .chain(stdout_dispatch)
        .chain(file_dispatch)
        .apply()
        .map_err(|e| ServiceToolError::ServiceTool {
            message: format!("Failed to initialize logger: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

    Ok(())
}
