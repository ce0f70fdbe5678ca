//! Tests for value chunks and value chains
//!
//! These tests verify:
//! - A new value is written with its first payload, which fixes its
//!   capacity (initial size)
//! - Appends fill the tail chunk, then spill into continuations
//! - Overwrites reuse the chain and unlink the unused remainder
//! - Record validation (type tag, CRC, truncation, initial size)
//! - Continuation loops are rejected

use std::path::PathBuf;

use pngdb::chunk::{ChunkFile, ChunkRef, Lookup, TreeChunk, ValueChunk, SIGNATURE};
use pngdb::PngDbError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

/// A fresh file holding the signature and an empty root
fn setup_chunk_file() -> (TempDir, PathBuf, ChunkFile, TreeChunk) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("values.pngdb");
    let mut file = ChunkFile::open(&path, false).unwrap();
    file.write_at(0, &SIGNATURE).unwrap();
    let root = TreeChunk::new(ChunkRef::ROOT);
    root.write(&mut file).unwrap();
    (temp_dir, path, file, root)
}

/// Write a new value for `key`
fn create(file: &mut ChunkFile, root: &mut TreeChunk, key: &[u8], initial: &[u8]) -> ValueChunk {
    root.get_value(file, key, Lookup::CreateNew(initial))
        .unwrap()
        .into_chunk()
}

/// Head of the chain for an existing `key`
fn value(file: &mut ChunkFile, root: &mut TreeChunk, key: &[u8]) -> ValueChunk {
    root.get_value(file, key, Lookup::Existing)
        .unwrap()
        .into_chunk()
}

fn chain_len(file: &mut ChunkFile, head: &ValueChunk) -> usize {
    let mut len = 1;
    let mut next = head.next();
    while let Some(at) = next {
        next = file.read_value(at).unwrap().next();
        len += 1;
    }
    len
}

// =============================================================================
// Write / Read Tests
// =============================================================================

#[test]
fn test_created_value_fixes_initial_size() {
    let (_temp, _path, mut file, mut root) = setup_chunk_file();

    let chunk = create(&mut file, &mut root, b"k", b"hello");
    assert_eq!(chunk.initial_size(), 5);
    assert!(chunk.next().is_none());

    let reread = file.read_value(chunk.offset()).unwrap();
    assert_eq!(reread.data(), b"hello");
    assert_eq!(reread.initial_size(), 5);
    assert!(reread.next().is_none());
}

#[test]
fn test_standalone_create_appends_to_file() {
    let (_temp, _path, mut file, _root) = setup_chunk_file();
    let end = file.len();

    let chunk = ValueChunk::create(&mut file, b"xyz").unwrap();

    assert_eq!(chunk.offset().offset(), end);
    assert_eq!(file.len(), end + 5 + 3 + 12 + 4);
    assert_eq!(file.read_value(chunk.offset()).unwrap().data(), b"xyz");
}

#[test]
fn test_empty_value() {
    let (_temp, _path, mut file, mut root) = setup_chunk_file();

    create(&mut file, &mut root, b"k", b"");

    let head = value(&mut file, &mut root, b"k");
    assert_eq!(head.get_data(&mut file).unwrap(), b"");
    assert_eq!(head.initial_size(), 0);
}

#[test]
fn test_record_layout() {
    let (_temp, path, mut file, mut root) = setup_chunk_file();

    let chunk = create(&mut file, &mut root, b"k", b"abc");
    drop(file);

    let bytes = std::fs::read(&path).unwrap();
    let at = chunk.offset().offset() as usize;
    let record = &bytes[at..];

    assert_eq!(record[0], 2);
    assert_eq!(&record[1..5], &[0, 0, 0, 3]);
    assert_eq!(&record[5..8], b"abc");
    assert_eq!(&record[8..12], &[0, 0, 0, 3]);
    assert_eq!(&record[12..20], &[0u8; 8]);
    assert_eq!(record.len(), 5 + 3 + 12 + 4);
}

// =============================================================================
// Append Tests
// =============================================================================

#[test]
fn test_append_to_empty_value_spills() {
    let (_temp, _path, mut file, mut root) = setup_chunk_file();

    let mut chunk = create(&mut file, &mut root, b"k", b"");
    chunk.append_data(&mut file, b"ab").unwrap();

    assert_eq!(chunk.initial_size(), 0);
    assert_eq!(chunk.get_data(&mut file).unwrap(), b"ab");
    assert_eq!(chain_len(&mut file, &chunk), 2);
}

#[test]
fn test_append_spills_into_continuation() {
    let (_temp, _path, mut file, mut root) = setup_chunk_file();

    create(&mut file, &mut root, b"k", b"ab");
    value(&mut file, &mut root, b"k").append_data(&mut file, b"cd").unwrap();

    let head = value(&mut file, &mut root, b"k");
    assert_eq!(head.get_data(&mut file).unwrap(), b"abcd");
    assert_eq!(head.data(), b"ab");
    assert!(head.next().is_some());
    assert_eq!(chain_len(&mut file, &head), 2);
}

#[test]
fn test_append_fills_tail_capacity_first() {
    let (_temp, _path, mut file, mut root) = setup_chunk_file();

    // capacity 6, then shrink to 2 bytes so the head has room again
    create(&mut file, &mut root, b"k", b"123456");
    value(&mut file, &mut root, b"k").overwrite_data(&mut file, b"12").unwrap();
    let size_before = file.len();

    value(&mut file, &mut root, b"k").append_data(&mut file, b"34").unwrap();

    let head = value(&mut file, &mut root, b"k");
    assert_eq!(head.get_data(&mut file).unwrap(), b"1234");
    assert!(head.next().is_none());
    assert_eq!(file.len(), size_before);
}

#[test]
fn test_repeated_appends_build_a_chain() {
    let (_temp, _path, mut file, mut root) = setup_chunk_file();

    let mut expected = b"aaa".to_vec();
    create(&mut file, &mut root, b"list", &expected);
    for i in 1..10u8 {
        let item = [b'a' + i; 3];
        value(&mut file, &mut root, b"list").append_data(&mut file, &item).unwrap();
        expected.extend_from_slice(&item);
    }

    let head = value(&mut file, &mut root, b"list");
    assert_eq!(head.get_data(&mut file).unwrap(), expected);
    assert_eq!(chain_len(&mut file, &head), 10);
}

// =============================================================================
// Overwrite Tests
// =============================================================================

#[test]
fn test_overwrite_shorter_drops_continuation() {
    let (_temp, _path, mut file, mut root) = setup_chunk_file();

    create(&mut file, &mut root, b"k", b"abc");
    value(&mut file, &mut root, b"k").append_data(&mut file, b"defg").unwrap();
    let size_before = file.len();

    value(&mut file, &mut root, b"k").overwrite_data(&mut file, b"xy").unwrap();

    let head = value(&mut file, &mut root, b"k");
    assert_eq!(head.get_data(&mut file).unwrap(), b"xy");
    assert!(head.next().is_none());
    // the unlinked continuation is leaked, not reclaimed
    assert_eq!(file.len(), size_before);
}

#[test]
fn test_overwrite_longer_extends_chain() {
    let (_temp, _path, mut file, mut root) = setup_chunk_file();

    create(&mut file, &mut root, b"k", b"abc");
    value(&mut file, &mut root, b"k").overwrite_data(&mut file, b"123456789").unwrap();

    let head = value(&mut file, &mut root, b"k");
    assert_eq!(head.data(), b"123");
    assert_eq!(head.initial_size(), 3);
    assert_eq!(head.get_data(&mut file).unwrap(), b"123456789");
}

#[test]
fn test_overwrite_reuses_existing_chain() {
    let (_temp, _path, mut file, mut root) = setup_chunk_file();

    create(&mut file, &mut root, b"k", b"abc");
    value(&mut file, &mut root, b"k").append_data(&mut file, b"defg").unwrap();
    let size_before = file.len();

    // 3 + 4 bytes fit the existing two chunks exactly
    value(&mut file, &mut root, b"k").overwrite_data(&mut file, b"ABCDEFG").unwrap();

    let head = value(&mut file, &mut root, b"k");
    assert_eq!(head.get_data(&mut file).unwrap(), b"ABCDEFG");
    assert_eq!(file.len(), size_before);
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_value_crc_mismatch_detected() {
    let (_temp, path, mut file, mut root) = setup_chunk_file();

    let chunk = create(&mut file, &mut root, b"k", b"hello world");
    let at = chunk.offset().offset() as usize;
    drop(file);

    let mut bytes = std::fs::read(&path).unwrap();
    bytes[at + 5 + 2] ^= 0xFF;
    std::fs::write(&path, &bytes).unwrap();

    let mut file = ChunkFile::open(&path, true).unwrap();
    let result = file.read_value(chunk.offset());
    match result {
        Err(PngDbError::Format(msg)) => assert!(msg.contains("CRC")),
        other => panic!("expected CRC error, got {:?}", other),
    }
}

#[test]
fn test_value_wrong_type_detected() {
    let (_temp, _path, mut file, _root) = setup_chunk_file();

    // the root is a tree chunk, not a value chunk
    let result = file.read_value(ChunkRef::ROOT);
    assert!(matches!(result, Err(PngDbError::Format(_))));
}

#[test]
fn test_value_truncated_record_detected() {
    let (_temp, path, mut file, mut root) = setup_chunk_file();

    let chunk = create(&mut file, &mut root, b"k", b"hello world");
    drop(file);

    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();

    let mut file = ChunkFile::open(&path, true).unwrap();
    assert!(matches!(
        file.read_value(chunk.offset()),
        Err(PngDbError::Format(_))
    ));
}

#[test]
fn test_initial_size_below_length_rejected() {
    let (_temp, path, mut file, mut root) = setup_chunk_file();

    let chunk = create(&mut file, &mut root, b"k", b"abcd");
    let at = chunk.offset().offset() as usize;
    drop(file);

    // rewrite the record by hand with initial size 2 < length 4 and a valid CRC
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[at + 5 + 4..at + 5 + 8].copy_from_slice(&2u32.to_be_bytes());
    let crc = pngdb::codec::checksum(&bytes[at + 5..at + 5 + 4 + 12]);
    bytes[at + 5 + 16..at + 5 + 20].copy_from_slice(&crc.to_be_bytes());
    std::fs::write(&path, &bytes).unwrap();

    let mut file = ChunkFile::open(&path, true).unwrap();
    match file.read_value(chunk.offset()) {
        Err(PngDbError::Format(msg)) => assert!(msg.contains("initial size")),
        other => panic!("expected initial size error, got {:?}", other),
    }
}

#[test]
fn test_continuation_loop_rejected() {
    let (_temp, path, mut file, mut root) = setup_chunk_file();

    let chunk = create(&mut file, &mut root, b"k", b"abcd");
    let at = chunk.offset().offset();
    drop(file);

    // point the chunk's continuation at itself, with a valid CRC
    let start = at as usize;
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[start + 5 + 8..start + 5 + 16].copy_from_slice(&at.to_be_bytes());
    let crc = pngdb::codec::checksum(&bytes[start + 5..start + 5 + 16]);
    bytes[start + 5 + 16..start + 5 + 20].copy_from_slice(&crc.to_be_bytes());
    std::fs::write(&path, &bytes).unwrap();

    let mut file = ChunkFile::open(&path, true).unwrap();
    let head = file.read_value(chunk.offset()).unwrap();
    match head.get_data(&mut file) {
        Err(PngDbError::Format(msg)) => assert!(msg.contains("loops")),
        other => panic!("expected loop error, got {:?}", other),
    }
}
