// Unit tests for single-entry zip packaging.

use crate::backup::archive::{MAX_ENTRY_SIZE, pack, unpack, unpack_within};
use crate::backup::{EXPORT_ENTRY_NAME, IMPORT_ENTRY_NAME};
use crate::error::backup::BackupError;

/// **VALUE**: Verifies a packed entry can be read back by name.
///
/// **WHY THIS MATTERS**: The device reads exported archives by entry name;
/// a wrong name or broken compression makes every export useless.
///
/// **BUG THIS CATCHES**: Would catch an unfinished zip writer (missing
/// central directory) or content written under a different name.
#[test]
fn given_packed_entry_when_unpacked_by_name_then_same_content() {
    // GIVEN: A dump packed under the export entry
    let dump = b"SQLite format 3\0".repeat(64);
    let archive = pack(EXPORT_ENTRY_NAME, &dump).unwrap();

    // WHEN: Unpacking that entry
    let content = unpack(&archive, &[EXPORT_ENTRY_NAME]).unwrap();

    // THEN: Content is identical
    assert_eq!(content, dump);
}

/// **VALUE**: Verifies entries are tried in the given order.
///
/// **WHY THIS MATTERS**: Imports prefer the import entry but must still
/// accept an archive produced by an export.
///
/// **BUG THIS CATCHES**: Would catch stopping at the first missing entry.
#[test]
fn given_only_export_entry_when_unpacked_with_fallback_then_found() {
    let archive = pack(EXPORT_ENTRY_NAME, b"dump").unwrap();

    let content = unpack(&archive, &[IMPORT_ENTRY_NAME, EXPORT_ENTRY_NAME]).unwrap();

    assert_eq!(content, b"dump".to_vec());
}

/// **VALUE**: Verifies a zip without any wanted entry is an archive error.
#[test]
fn given_archive_without_wanted_entry_when_unpacked_then_archive_error() {
    let archive = pack("other", b"dump").unwrap();

    let result = unpack(&archive, &[IMPORT_ENTRY_NAME]);

    match result {
        Err(BackupError::Archive { message, .. }) => assert!(message.contains(IMPORT_ENTRY_NAME)),
        other => panic!("Expected archive error, got {other:?}"),
    }
}

/// **VALUE**: Verifies non-zip bytes are an archive error, not a panic.
#[test]
fn given_garbage_bytes_when_unpacked_then_archive_error() {
    let result = unpack(b"definitely not a zip", &[IMPORT_ENTRY_NAME]);

    assert!(matches!(result, Err(BackupError::Archive { .. })));
}

/// Overwrite the uncompressed size in every local and central header.
fn declare_uncompressed_size(archive: &mut [u8], size: u32) {
    const LOCAL_HEADER: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];
    const CENTRAL_HEADER: [u8; 4] = [0x50, 0x4b, 0x01, 0x02];

    let mut patched = 0;
    for offset in 0..archive.len().saturating_sub(4) {
        let field = match &archive[offset..offset + 4] {
            signature if signature == LOCAL_HEADER => offset + 22,
            signature if signature == CENTRAL_HEADER => offset + 24,
            _ => continue,
        };
        archive[field..field + 4].copy_from_slice(&size.to_le_bytes());
        patched += 1;
    }
    assert_eq!(patched, 2, "expected one local and one central header");
}

/// **VALUE**: Verifies a header claiming a huge entry is rejected before
/// anything is allocated for it.
///
/// **WHY THIS MATTERS**: The archive arrives from the peer in `upload_db`.
/// Sizing a buffer from its header lets one frame request gigabytes, and a
/// failed allocation aborts the whole process.
///
/// **BUG THIS CATCHES**: Would catch pre-allocating from the declared size
/// or accepting the entry because its real content is small.
#[test]
fn given_entry_declaring_huge_size_when_unpacked_then_archive_error() {
    // GIVEN: A two byte entry whose headers claim almost 4 GiB
    let mut archive = pack(IMPORT_ENTRY_NAME, b"hi").unwrap();
    declare_uncompressed_size(&mut archive, 0xFFFF_FFFE);

    // WHEN: Unpacking it
    let result = unpack(&archive, &[IMPORT_ENTRY_NAME]);

    // THEN: Rejected as an archive error naming the limit
    match result {
        Err(BackupError::Archive { message, .. }) => {
            assert!(message.contains(&MAX_ENTRY_SIZE.to_string()), "{message}")
        }
        other => panic!("Expected archive error, got {other:?}"),
    }
}

/// **VALUE**: Verifies an entry over the limit is refused while one at the
/// limit is accepted.
#[test]
fn given_size_limit_when_unpacking_then_only_entries_within_it_pass() {
    let archive = pack(IMPORT_ENTRY_NAME, &[7u8; 64]).unwrap();

    let over = unpack_within(&archive, &[IMPORT_ENTRY_NAME], 63);
    let exact = unpack_within(&archive, &[IMPORT_ENTRY_NAME], 64).unwrap();

    assert!(matches!(over, Err(BackupError::Archive { .. })));
    assert_eq!(exact, vec![7u8; 64]);
}
