//! Single-entry zip packaging for backup transfers.

use crate::error::backup::BackupError;

use common::ErrorLocation;

use std::io::{Cursor, Read, Write};
use std::panic::Location;

use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Largest entry accepted on import.
pub(crate) const MAX_ENTRY_SIZE: u64 = 256 * 1024 * 1024;

/// Wrap `content` as the only entry `entry` of a new zip archive.
pub(crate) fn pack(entry: &str, content: &[u8]) -> Result<Vec<u8>, BackupError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    writer.start_file(entry, options)?;
    writer.write_all(content)?;

    Ok(writer.finish()?.into_inner())
}

/// Contents of the first of `entries` present in `archive`.
///
/// # Errors
///
/// - [`BackupError::Archive`] if `archive` is not a zip, none of the
///   entries exist, or the entry is larger than [`MAX_ENTRY_SIZE`]
pub(crate) fn unpack(archive: &[u8], entries: &[&str]) -> Result<Vec<u8>, BackupError> {
    unpack_within(archive, entries, MAX_ENTRY_SIZE)
}

/// [`unpack`] with an explicit size limit for the entry.
pub(crate) fn unpack_within(
    archive: &[u8],
    entries: &[&str],
    max_size: u64,
) -> Result<Vec<u8>, BackupError> {
    let mut archive = ZipArchive::new(Cursor::new(archive))?;

    for name in entries {
        match archive.by_name(name) {
            Ok(file) => {
                // Declared size is set by the sender.
                if file.size() > max_size {
                    return Err(too_large(name, file.size(), max_size));
                }

                let mut content = Vec::new();
                file.take(max_size + 1).read_to_end(&mut content)?;
                if content.len() as u64 > max_size {
                    return Err(too_large(name, content.len() as u64, max_size));
                }
                return Ok(content);
            }
            Err(ZipError::FileNotFound) => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Err(BackupError::Archive {
        message: format!("Archive has no entry named {}", entries.join(" or ")),
        location: ErrorLocation::from(Location::caller()),
    })
}

#[track_caller]
fn too_large(name: &str, size: u64, max_size: u64) -> BackupError {
    BackupError::Archive {
        message: format!("Entry {name} is {size} bytes, limit is {max_size}"),
        location: ErrorLocation::from(Location::caller()),
    }
}
