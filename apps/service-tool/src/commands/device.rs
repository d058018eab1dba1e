//! Device side of the link, for bench testing a control point.
//!
//! Waits for one control point, then runs the device's usual sequence:
//! `test_event`, `cp_info`, then optionally `backup_db` and `upload_db`.

use crate::error::ServiceToolError;

use link_core::backup::DbExportKind;
use link_core::config::ServiceToolConfig;
use link_core::peer::{PeerConnection, PeerServer};
use link_core::session::{PeerInfo, TEST_EVENT_ACK};
use link_core::wire::{EventEnvelope, WireEvent};

use common::ErrorLocation;

use std::panic::Location;
use std::path::PathBuf;
use std::time::Duration;

use log::{info, warn};
use serde_json::{Value, json};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeOptions {
    pub bind: String,
    pub answer_timeout: Duration,
    pub backup: Option<DbExportKind>,
    pub output: Option<PathBuf>,
    pub restore: Option<PathBuf>,
}

impl ServeOptions {
    pub fn from_config(config: &ServiceToolConfig) -> Self {
        Self {
            bind: config.peer.bind_address.clone(),
            answer_timeout: config.answer_timeout(),
            backup: None,
            output: None,
            restore: None,
        }
    }
}

/// What a drive of one control point produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServeReport {
    pub peer_info: Option<PeerInfo>,
    pub backup: Option<Vec<u8>>,
    pub restored: bool,
}

/// Bind, wait for one control point and drive it.
///
/// # Errors
///
/// - [`ServiceToolError::Core`] if binding or a request fails
/// - [`ServiceToolError::Interrupted`] on Ctrl+C before a control point connects
pub async fn serve(options: &ServeOptions) -> Result<ServeReport, ServiceToolError> {
    let server = PeerServer::bind(&options.bind).await?;
    info!("Waiting for a control point on {}", server.local_addr());

    let connection = tokio::select! {
        connection = server.next_control_point() => {
            connection.ok_or_else(|| ServiceToolError::ServiceTool {
                message: "Peer endpoint stopped accepting".to_string(),
                location: ErrorLocation::from(Location::caller()),
            })?
        }
        _ = tokio::signal::ctrl_c() => {
            return Err(ServiceToolError::Interrupted {
                message: "No control point connected".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }
    };

    let report = drive_control_point(&connection, options).await;
    connection.close();
    server.shutdown();
    report
}

/// Run the device request sequence against `connection`.
///
/// # Errors
///
/// - [`ServiceToolError::RequestFailed`] if `test_event`, `backup_db` or
///   `upload_db` is answered with a failure
/// - [`ServiceToolError::Core`] on a missing or malformed answer
/// - [`ServiceToolError::ServiceTool`] if the archive files cannot be read or written
pub async fn drive_control_point(
    connection: &PeerConnection,
    options: &ServeOptions,
) -> Result<ServeReport, ServiceToolError> {
    let mut report = ServeReport::default();
    let wait = options.answer_timeout;

    let test = require_success(
        connection
            .request(WireEvent::EventTest.name(), Value::Null, wait)
            .await?,
    )?;
    if test != json!(TEST_EVENT_ACK) {
        warn!("Unexpected test_event answer: {test}");
    }

    let info = connection
        .request(WireEvent::CpInfo.name(), Value::Null, wait)
        .await?;
    report.peer_info = match require_success(info) {
        Ok(data) => Some(decode(data, "cp_info")?),
        Err(e) => {
            warn!("Control point has no info: {e}");
            None
        }
    };
    if let Some(ref peer_info) = report.peer_info {
        info!(
            "Control point {} at site {}",
            peer_info.identifier, peer_info.site
        );
    }

    if let Some(kind) = options.backup {
        let answer = connection
            .request(WireEvent::BackupDb.name(), json!(kind.code()), wait)
            .await?;
        let archive: Vec<u8> = decode(require_success(answer)?, "backup_db")?;
        info!("Received {kind:?} backup of {} bytes", archive.len());

        if let Some(ref output) = options.output {
            tokio::fs::write(output, &archive)
                .await
                .map_err(|e| ServiceToolError::ServiceTool {
                    message: format!("Failed to write {}: {e}", output.display()),
                    location: ErrorLocation::from(Location::caller()),
                })?;
            info!("Backup written to {}", output.display());
        }
        report.backup = Some(archive);
    }

    if let Some(ref restore) = options.restore {
        let archive = tokio::fs::read(restore)
            .await
            .map_err(|e| ServiceToolError::ServiceTool {
                message: format!("Failed to read {}: {e}", restore.display()),
                location: ErrorLocation::from(Location::caller()),
            })?;
        let answer = connection
            .request(WireEvent::UploadDb.name(), json!(archive), wait)
            .await?;
        require_success(answer)?;
        info!("Restored {} onto the control point", restore.display());
        report.restored = true;
    }

    Ok(report)
}

#[track_caller]
fn require_success(answer: EventEnvelope) -> Result<Value, ServiceToolError> {
    if answer.is_success() {
        return Ok(answer.into_data().unwrap_or(Value::Null));
    }

    Err(ServiceToolError::RequestFailed {
        message: format!(
            "'{}' failed: {}",
            answer.event(),
            answer.error().unwrap_or("no reason given")
        ),
        location: ErrorLocation::from(Location::caller()),
    })
}

#[track_caller]
fn decode<T: serde::de::DeserializeOwned>(data: Value, event: &str) -> Result<T, ServiceToolError> {
    serde_json::from_value(data).map_err(|e| ServiceToolError::Core {
        message: format!("Malformed '{event}' answer: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })
}
