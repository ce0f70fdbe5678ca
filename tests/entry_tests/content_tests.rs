//! Tests for entries, digests and directory records
//!
//! These tests verify:
//! - Preparing an entry computes the SHA-1 and the zlib form
//! - Rebuilding from stored bytes re-derives raw bytes and digest
//! - Entry equality (digest plus compressed-or-raw match)
//! - Unprepared entries cannot be stored
//! - Directory record encoding and its validation

use pngdb::entry::{Digest, DirEntry, DIGEST_LEN, S_IFDIR, S_IFMT, S_IFREG};
use pngdb::{DbEntry, DecodeError, PngDbError};

// =============================================================================
// Digest Tests
// =============================================================================

#[test]
fn test_digest_known_values() {
    assert_eq!(
        Digest::of(b"hello").to_hex(),
        "AAF4C61DDCC5E8A2DABEDE0F3B482CD9AEA9434D"
    );
    assert_eq!(
        Digest::of(b"").to_hex(),
        "DA39A3EE5E6B4B0D3255BFEF95601890AFD80709"
    );
}

#[test]
fn test_digest_bytes_roundtrip() {
    let digest = Digest::of(b"pixels");
    assert_eq!(digest.as_bytes().len(), DIGEST_LEN);
    assert_eq!(Digest::from_bytes(*digest.as_bytes()), digest);
    assert_eq!(digest.to_string(), digest.to_hex());
}

// =============================================================================
// DbEntry Tests
// =============================================================================

#[test]
fn test_new_entry_is_prepared() {
    let entry = DbEntry::new(b"hello".to_vec()).unwrap();

    assert!(entry.is_prepared());
    assert_eq!(entry.raw(), b"hello");
    assert_eq!(entry.digest(), Some(&Digest::of(b"hello")));
    let compressed = entry.compressed().unwrap();
    assert_eq!(pngdb::compress::decompress(compressed).unwrap(), b"hello");
}

#[test]
fn test_unprepared_entry_has_no_storage_form() {
    let mut entry = DbEntry::unprepared(b"raw".to_vec());
    assert!(!entry.is_prepared());
    match entry.storage_form() {
        Err(PngDbError::InvalidEntry(msg)) => assert!(msg.contains("SHA1")),
        other => panic!("expected InvalidEntry, got {:?}", other),
    }

    entry.compute_digest();
    match entry.storage_form() {
        Err(PngDbError::InvalidEntry(msg)) => assert!(msg.contains("compression")),
        other => panic!("expected InvalidEntry, got {:?}", other),
    }

    entry.compress(9).unwrap();
    let (digest, compressed) = entry.storage_form().unwrap();
    assert_eq!(digest, &Digest::of(b"raw"));
    assert!(!compressed.is_empty());
}

#[test]
fn test_from_compressed_rederives_fields() {
    let original = DbEntry::new(vec![7u8; 10_000]).unwrap();
    let stored = original.compressed().unwrap().to_vec();

    let rebuilt = DbEntry::from_compressed(stored).unwrap();
    assert_eq!(rebuilt.raw(), original.raw());
    assert_eq!(rebuilt.digest(), original.digest());
    assert_eq!(rebuilt, original);
}

#[test]
fn test_from_compressed_corrupt_is_decode_error() {
    let result = DbEntry::from_compressed(b"definitely not zlib".to_vec());
    assert!(matches!(result, Err(PngDbError::Decode(DecodeError::Data))));
}

#[test]
fn test_into_raw() {
    let entry = DbEntry::new(b"bytes".to_vec()).unwrap();
    assert_eq!(entry.into_raw(), b"bytes");
}

// =============================================================================
// Equality Tests
// =============================================================================

#[test]
fn test_equal_entries() {
    let a = DbEntry::new(b"same".to_vec()).unwrap();
    let b = DbEntry::new(b"same".to_vec()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_equal_despite_different_compression() {
    // level 0 (stored) and level 9 differ byte-wise but hold the same data
    let a = DbEntry::with_level(vec![1u8; 500], 0).unwrap();
    let b = DbEntry::with_level(vec![1u8; 500], 9).unwrap();
    assert_ne!(a.compressed(), b.compressed());
    assert_eq!(a, b);
}

#[test]
fn test_different_content_not_equal() {
    let a = DbEntry::new(b"one".to_vec()).unwrap();
    let b = DbEntry::new(b"two".to_vec()).unwrap();
    assert_ne!(a, b);
}

#[test]
fn test_missing_digest_never_equal() {
    let a = DbEntry::unprepared(b"same".to_vec());
    let b = DbEntry::unprepared(b"same".to_vec());
    assert_ne!(a, b);

    let prepared = DbEntry::new(b"same".to_vec()).unwrap();
    assert_ne!(a, prepared);
}

// =============================================================================
// DirEntry Tests
// =============================================================================

#[test]
fn test_dir_entry_constructors() {
    let file = DirEntry::file("image.png", 1234);
    assert!(file.is_file());
    assert!(!file.is_dir());
    assert_eq!(file.mode & S_IFMT, S_IFREG);
    assert_eq!(file.mode & 0o777, 0o444);
    assert_eq!(file.size, 1234);

    let dir = DirEntry::dir("album");
    assert!(dir.is_dir());
    assert_eq!(dir.mode & S_IFMT, S_IFDIR);
    assert_eq!(dir.size, 0);
}

#[test]
fn test_dir_entry_serialize_layout() {
    let entry = DirEntry {
        mode: 0x81A4,
        size: 0x0102_0304,
        name: "a.png".to_string(),
    };
    let bytes = entry.serialize();

    assert_eq!(&bytes[..2], &[0x81, 0xA4]);
    assert_eq!(&bytes[2..6], &[0x01, 0x02, 0x03, 0x04]);
    assert_eq!(&bytes[6..], b"a.png");
    assert_eq!(DirEntry::deserialize(&bytes).unwrap(), entry);
}

#[test]
fn test_dir_entry_without_name_rejected() {
    let bytes = DirEntry::file("", 10).serialize();
    assert_eq!(bytes.len(), 6);
    assert!(matches!(
        DirEntry::deserialize(&bytes),
        Err(PngDbError::Format(_))
    ));
    assert!(matches!(
        DirEntry::deserialize(&[0, 1]),
        Err(PngDbError::Format(_))
    ));
}

#[test]
fn test_dir_entry_invalid_utf8_rejected() {
    let mut bytes = DirEntry::file("x", 1).serialize();
    bytes.push(0xFF);
    assert!(matches!(
        DirEntry::deserialize(&bytes),
        Err(PngDbError::Format(_))
    ));
}
