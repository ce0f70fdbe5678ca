//! Tests for the entry-list codec
//!
//! These tests verify:
//! - Items are length-prefixed with a single byte
//! - Appending an encoded item extends an encoded list
//! - Empty items and the 255-byte limit
//! - Truncated lists are rejected

use pngdb::entry::list::{decode_list, encode_item, encode_list, MAX_ITEM_LEN};
use pngdb::PngDbError;

#[test]
fn test_encode_item_layout() {
    assert_eq!(encode_item(b"abc").unwrap(), b"\x03abc");
    assert_eq!(encode_item(b"").unwrap(), b"\x00");
}

#[test]
fn test_decode_list_items_in_order() {
    let items = decode_list(b"\x01A\x02BC\x00\x03DEF").unwrap();
    assert_eq!(
        items,
        vec![b"A".to_vec(), b"BC".to_vec(), Vec::new(), b"DEF".to_vec()]
    );
}

#[test]
fn test_empty_list() {
    assert!(decode_list(b"").unwrap().is_empty());
    assert!(encode_list(Vec::<Vec<u8>>::new()).unwrap().is_empty());
}

#[test]
fn test_append_equals_encode_list() {
    let items: [&[u8]; 2] = [b"first", b"second"];
    let mut value = encode_list(items).unwrap();
    value.extend_from_slice(&encode_item(b"third").unwrap());

    assert_eq!(
        decode_list(&value).unwrap(),
        vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()]
    );
}

#[test]
fn test_item_length_limit() {
    let max = vec![0x42; MAX_ITEM_LEN];
    let encoded = encode_item(&max).unwrap();
    assert_eq!(encoded[0], 255);
    assert_eq!(decode_list(&encoded).unwrap(), vec![max]);

    let too_long = vec![0x42; MAX_ITEM_LEN + 1];
    assert!(matches!(
        encode_item(&too_long),
        Err(PngDbError::InvalidEntry(_))
    ));
    assert!(matches!(
        encode_list([too_long]),
        Err(PngDbError::InvalidEntry(_))
    ));
}

#[test]
fn test_truncated_list_rejected() {
    // second item claims 5 bytes but only 2 follow
    let result = decode_list(b"\x01A\x05BC");
    assert!(matches!(result, Err(PngDbError::Format(_))));
}
