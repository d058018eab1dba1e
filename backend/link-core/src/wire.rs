//! Wire vocabulary shared by both ends of a link.
//!
//! Every message on a channel is a [`WireFrame`]: a named event plus a JSON
//! payload, carried in one WebSocket text frame. Requests and answers put an
//! [`EventEnvelope`] in that payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use std::fmt::{Display, Formatter, Result as FormatResult};
use std::str::FromStr;

/// Suffix appended to a request's event name to form its answer event.
pub const ANSWER_SUFFIX: &str = ":answer";

/// Query parameter carrying the [`ConnectionIdentity`] on channel open.
pub const IDENTITY_QUERY_KEY: &str = "identity";

/// Name of the answer event paired with `event`.
pub fn answer_event(event: &str) -> String {
    format!("{event}{ANSWER_SUFFIX}")
}

/// Role a channel is opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionIdentity {
    /// Disposable reachability probe.
    #[serde(rename = "TEST")]
    Test,
    /// Operational control point session.
    #[serde(rename = "CP")]
    ControlPoint,
}

impl ConnectionIdentity {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConnectionIdentity::Test => "TEST",
            ConnectionIdentity::ControlPoint => "CP",
        }
    }
}

impl Display for ConnectionIdentity {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for ConnectionIdentity {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "TEST" => Ok(ConnectionIdentity::Test),
            "CP" => Ok(ConnectionIdentity::ControlPoint),
            other => Err(format!("Unknown connection identity: {other}")),
        }
    }
}

/// Fixed event names spoken on a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireEvent {
    IsOnline,
    CpInfo,
    BackupDb,
    UploadDb,
    Disconnect,
    Reconnect,
    EventTest,
}

impl WireEvent {
    pub const ALL: [WireEvent; 7] = [
        WireEvent::IsOnline,
        WireEvent::CpInfo,
        WireEvent::BackupDb,
        WireEvent::UploadDb,
        WireEvent::Disconnect,
        WireEvent::Reconnect,
        WireEvent::EventTest,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            WireEvent::IsOnline => "is_online",
            WireEvent::CpInfo => "cp_info",
            WireEvent::BackupDb => "backup_db",
            WireEvent::UploadDb => "upload_db",
            WireEvent::Disconnect => "disconnect",
            WireEvent::Reconnect => "reconnect",
            WireEvent::EventTest => "test_event",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|event| event.name() == name)
    }

    pub fn answer_name(&self) -> String {
        answer_event(self.name())
    }
}

/// One named event on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl WireFrame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Request or answer body.
///
/// A successful envelope never carries an error and a failed one never
/// carries data. Both constructors and deserialization enforce this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEnvelope")]
pub struct EventEnvelope {
    event: String,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl EventEnvelope {
    pub fn success(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(event: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// Envelope a peer sends to invoke `event` with `data`.
    pub fn request(event: impl Into<String>, data: Value) -> Self {
        Self::success(event, data)
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn into_data(self) -> Option<Value> {
        self.data
    }

    /// Payload a handler receives for an inbound request.
    ///
    /// Requests are not always well-formed envelopes, so this only looks at
    /// the `data` field and yields `null` when there is none.
    pub fn request_payload(inbound: Value) -> Value {
        match inbound {
            Value::Object(mut fields) => fields.remove("data").unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }
}

#[derive(Deserialize)]
struct RawEnvelope {
    event: String,
    success: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

impl TryFrom<RawEnvelope> for EventEnvelope {
    type Error = String;

    fn try_from(raw: RawEnvelope) -> Result<Self, Self::Error> {
        match (raw.success, &raw.data, &raw.error) {
            (true, _, Some(_)) => Err(format!(
                "Envelope for '{}' is successful but carries an error",
                raw.event
            )),
            (false, Some(_), _) => Err(format!(
                "Envelope for '{}' failed but carries data",
                raw.event
            )),
            _ => Ok(Self {
                event: raw.event,
                success: raw.success,
                data: raw.data,
                error: raw.error,
            }),
        }
    }
}
