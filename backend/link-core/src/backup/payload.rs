//! Coercion of inbound upload payloads into raw bytes.
//!
//! Peers serialize byte buffers in whatever shape their JSON encoder picks:
//! a plain array of numbers, an object keyed by index (a typed array run
//! through a generic serializer), or a binary string.

use crate::error::backup::BackupError;

use common::ErrorLocation;

use std::panic::Location;

use serde_json::Value;

/// Whether a payload counts as "nothing sent".
///
/// Scalars other than non-empty strings carry no bytes and count as empty.
pub(crate) fn is_empty(payload: &Value) -> bool {
    match payload {
        Value::Null | Value::Bool(_) | Value::Number(_) => true,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}

/// Flatten a payload into bytes.
///
/// Numbers are truncated to their low 8 bits, as a byte array would store
/// them.
pub(crate) fn coerce_bytes(payload: &Value) -> Result<Vec<u8>, BackupError> {
    match payload {
        Value::Array(items) => items.iter().map(byte_of).collect(),
        Value::Object(fields) => {
            let mut indexed = fields
                .iter()
                .map(|(key, value)| {
                    let index = key.parse::<usize>().map_err(|_| BackupError::InvalidInput {
                        message: format!("Payload key '{key}' is not a byte index"),
                        location: ErrorLocation::from(Location::caller()),
                    })?;
                    Ok((index, byte_of(value)?))
                })
                .collect::<Result<Vec<_>, BackupError>>()?;
            indexed.sort_unstable_by_key(|(index, _)| *index);
            Ok(indexed.into_iter().map(|(_, byte)| byte).collect())
        }
        Value::String(text) => Ok(text_to_bytes(text.as_bytes())),
        other => Err(BackupError::InvalidInput {
            message: format!("Payload of type {} cannot hold an archive", kind_of(other)),
            location: ErrorLocation::from(Location::caller()),
        }),
    }
}

/// Decode `content` as UTF-8 text and keep the low byte of each char.
///
/// Exact for single-byte-per-char content. Invalid sequences decode to
/// U+FFFD and come out as `0xFD`.
pub(crate) fn text_to_bytes(content: &[u8]) -> Vec<u8> {
    String::from_utf8_lossy(content)
        .chars()
        .map(|c| c as u32 as u8)
        .collect()
}

#[track_caller]
fn byte_of(value: &Value) -> Result<u8, BackupError> {
    value
        .as_u64()
        .map(|number| (number & 0xFF) as u8)
        .ok_or_else(|| BackupError::InvalidInput {
            message: format!("Payload element {value} is not a byte"),
            location: ErrorLocation::from(Location::caller()),
        })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
