//! Commands a control point answers.

use crate::backup::{BackupPipeline, DbExportKind};
use crate::error::handler::HandlerError;
use crate::wire::WireEvent;

use common::ErrorLocation;

use std::panic::Location;

use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Acknowledgement returned by `test_event`.
pub const TEST_EVENT_ACK: &str = "ok";

/// Identity the control point announces for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    #[serde(rename = "cp_id")]
    pub identifier: String,
    pub site: String,
}

impl PeerInfo {
    pub fn new(identifier: impl Into<String>, site: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            site: site.into(),
        }
    }
}

/// Request events with an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    EventTest,
    CpInfo,
    BackupDb,
    UploadDb,
}

impl Command {
    pub const ALL: [Command; 4] = [
        Command::EventTest,
        Command::CpInfo,
        Command::BackupDb,
        Command::UploadDb,
    ];

    pub const fn wire_event(&self) -> WireEvent {
        match self {
            Command::EventTest => WireEvent::EventTest,
            Command::CpInfo => WireEvent::CpInfo,
            Command::BackupDb => WireEvent::BackupDb,
            Command::UploadDb => WireEvent::UploadDb,
        }
    }

    pub const fn event_name(&self) -> &'static str {
        self.wire_event().name()
    }
}

/// Per-session state the command handlers read.
#[derive(Clone)]
pub struct CommandHandlers {
    peer_info: Option<PeerInfo>,
    pipeline: BackupPipeline,
}

impl CommandHandlers {
    pub fn new(peer_info: Option<PeerInfo>, pipeline: BackupPipeline) -> Self {
        Self {
            peer_info,
            pipeline,
        }
    }

    pub async fn dispatch(&self, command: Command, payload: Value) -> Result<Value, HandlerError> {
        info!("Handling '{}'", command.event_name());

        match command {
            Command::EventTest => Ok(json!(TEST_EVENT_ACK)),
            Command::CpInfo => {
                let info = self
                    .peer_info
                    .as_ref()
                    .ok_or_else(|| HandlerError::Failed {
                        message: "No control point info for this session".to_string(),
                        location: ErrorLocation::from(Location::caller()),
                    })?;
                Ok(serde_json::to_value(info)?)
            }
            Command::BackupDb => {
                let kind = DbExportKind::from_payload(&payload).map_err(|e| {
                    HandlerError::InvalidPayload {
                        message: e.answer_message(),
                        location: ErrorLocation::from(Location::caller()),
                    }
                })?;
                let archive = self.pipeline.export_backup(kind).await?;
                Ok(serde_json::to_value(archive)?)
            }
            Command::UploadDb => {
                self.pipeline.import_backup(&payload).await?;
                Ok(Value::Null)
            }
        }
    }
}
