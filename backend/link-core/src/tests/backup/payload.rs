// Unit tests for the crate-private payload coercion helpers.
// Pipeline behavior over a store is covered in integration_tests/backup.

use crate::backup::payload::{coerce_bytes, is_empty, text_to_bytes};
use crate::error::backup::BackupError;

use serde_json::json;

/// **VALUE**: Verifies which payloads count as "nothing sent".
///
/// **WHY THIS MATTERS**: An empty upload must be refused before any archive
/// parsing is attempted, with a clear message rather than a zip error.
///
/// **BUG THIS CATCHES**: Would catch if an empty array or object slipped
/// through to the zip reader, or if a non-empty string was treated as empty.
#[test]
fn given_byte_less_payloads_when_checked_then_empty() {
    assert!(is_empty(&json!(null)));
    assert!(is_empty(&json!(false)));
    assert!(is_empty(&json!(7)));
    assert!(is_empty(&json!("")));
    assert!(is_empty(&json!([])));
    assert!(is_empty(&json!({})));

    assert!(!is_empty(&json!("PK")));
    assert!(!is_empty(&json!([80, 75])));
    assert!(!is_empty(&json!({"0": 80})));
}

/// **VALUE**: Verifies an array of numbers becomes the same bytes.
///
/// **WHY THIS MATTERS**: This is how most peers serialize a byte buffer.
///
/// **BUG THIS CATCHES**: Would catch values above 255 being rejected
/// instead of truncated like a byte array store does.
#[test]
fn given_number_array_when_coerced_then_low_bytes_kept() {
    // GIVEN: An array payload with one out-of-range value
    let payload = json!([80, 75, 3, 4, 256 + 9]);

    // WHEN: Coercing
    let bytes = coerce_bytes(&payload).unwrap();

    // THEN: Values are kept in order, truncated to 8 bits
    assert_eq!(bytes, vec![80, 75, 3, 4, 9]);
}

/// **VALUE**: Verifies index-keyed objects are reassembled in index order.
///
/// **WHY THIS MATTERS**: A typed array run through a generic JSON encoder
/// arrives as `{"0": .., "1": .., "10": ..}`; map order is lexical, not
/// numeric.
///
/// **BUG THIS CATCHES**: Would catch sorting keys as strings, which puts
/// "10" before "2" and corrupts the archive.
#[test]
fn given_index_keyed_object_when_coerced_then_sorted_numerically() {
    let mut fields = serde_json::Map::new();
    for index in 0..12u64 {
        fields.insert(index.to_string(), json!(index + 100));
    }
    let payload = serde_json::Value::Object(fields);

    let bytes = coerce_bytes(&payload).unwrap();

    assert_eq!(bytes, (100..112).collect::<Vec<u8>>());
}

/// **VALUE**: Verifies objects with non-index keys are refused.
///
/// **BUG THIS CATCHES**: Would catch silently dropping fields and importing
/// a partial archive.
#[test]
fn given_object_with_named_key_when_coerced_then_invalid_input() {
    let payload = json!({"0": 80, "name": 75});

    let result = coerce_bytes(&payload);

    assert!(matches!(result, Err(BackupError::InvalidInput { .. })));
}

/// **VALUE**: Verifies non-numeric array elements are refused.
#[test]
fn given_array_with_text_element_when_coerced_then_invalid_input() {
    let result = coerce_bytes(&json!([80, "K"]));

    assert!(matches!(result, Err(BackupError::InvalidInput { .. })));
}

/// **VALUE**: Verifies binary strings map each char to its low byte.
///
/// **WHY THIS MATTERS**: Peers that send a "binary string" encode each byte
/// as one char in 0..=255; those chars become multi-byte UTF-8 in JSON.
///
/// **BUG THIS CATCHES**: Would catch returning the UTF-8 encoding of the
/// string instead of one byte per char.
#[test]
fn given_binary_string_when_coerced_then_one_byte_per_char() {
    let payload = json!("PK\u{0003}\u{00ff}");

    let bytes = coerce_bytes(&payload).unwrap();

    assert_eq!(bytes, vec![b'P', b'K', 0x03, 0xFF]);
}

/// **VALUE**: Verifies ASCII content passes through unchanged.
#[test]
fn given_ascii_text_when_converted_then_identical_bytes() {
    let content = b"CREATE TABLE site (id INTEGER);";

    assert_eq!(text_to_bytes(content), content.to_vec());
}

/// **VALUE**: Verifies invalid UTF-8 decodes to the replacement char's low
/// byte instead of failing.
///
/// **BUG THIS CATCHES**: Would catch a panic or error on arbitrary bytes.
#[test]
fn given_invalid_utf8_when_converted_then_replacement_low_byte() {
    let bytes = text_to_bytes(&[b'a', 0xC3, b'b']);

    assert_eq!(bytes, vec![b'a', 0xFD, b'b']);
}
