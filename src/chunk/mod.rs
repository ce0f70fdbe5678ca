//! Chunk Module
//!
//! The single-file storage engine: a paged trie of fixed-size tree chunks
//! whose leaves point at chains of value chunks.
//!
//! ## Responsibilities
//! - Allocate chunks at the end of the file (never reclaimed)
//! - Rewrite chunks in place at their fixed offset
//! - CRC-protect every record and reject anything that fails validation
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │ Signature (12 bytes)   89 'A' 'Z' 'P' 'N' 'G' 'D' 'B' 0D 0A 1A 0A     │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │ Root Tree Chunk @12                                                  │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │ ... tree and value chunks, appended as they are allocated ...        │
//! └──────────────────────────────────────────────────────────────────────┘
//!
//! Tree Chunk (114 bytes)
//! ┌────────┬──────────┬──────────┬───────────┬────────────────────┬─────────┐
//! │Type=1  │ Len (4)  │ Bits (1) │ Refs 8×8  │ Keys 8×(1 + 4)     │ CRC (4) │
//! └────────┴──────────┴──────────┴───────────┴────────────────────┴─────────┘
//!            Len = 105, CRC over Bits..Keys
//!
//! Value Chunk (21 + len bytes)
//! ┌────────┬──────────┬──────────┬─────────────┬──────────┬─────────┐
//! │Type=2  │ Len (4)  │ Payload  │ Initial (4) │ Next (8) │ CRC (4) │
//! └────────┴──────────┴──────────┴─────────────┴──────────┴─────────┘
//!            CRC over Payload + Initial + Next
//! ```
//!
//! All integers are big-endian. Offset 0 never holds a chunk and encodes
//! "no reference".

mod file;
mod tree;
mod value;

use std::fmt;
use std::num::NonZeroU64;

pub use file::ChunkFile;
pub use tree::{Located, Lookup, Slot, TreeChunk, KEY_PART_LIMIT, NUM_SLOTS};
pub use value::ValueChunk;

// =============================================================================
// Shared Constants
// =============================================================================

/// Magic bytes at the start of every database file
pub const SIGNATURE: [u8; 12] = [137, b'A', b'Z', b'P', b'N', b'G', b'D', b'B', 13, 10, 26, 10];

/// The root tree chunk sits right after the signature
pub const ROOT_OFFSET: u64 = SIGNATURE.len() as u64;

pub(crate) const CHUNK_TYPE_TREE: u8 = 1;
pub(crate) const CHUNK_TYPE_VALUE: u8 = 2;

// =============================================================================
// Chunk References
// =============================================================================

/// Absolute file offset of a chunk
///
/// Never zero: a missing reference is `Option<ChunkRef>::None`, which is
/// stored on disk as offset 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkRef(NonZeroU64);

impl ChunkRef {
    /// Location of the root tree chunk
    pub const ROOT: ChunkRef = match NonZeroU64::new(ROOT_OFFSET) {
        Some(offset) => ChunkRef(offset),
        None => panic!("root offset must be non-zero"),
    };

    /// Wrap a raw offset; `None` for the offset-0 sentinel
    pub fn new(offset: u64) -> Option<Self> {
        NonZeroU64::new(offset).map(ChunkRef)
    }

    pub fn offset(self) -> u64 {
        self.0.get()
    }

    /// On-disk form of an optional reference
    pub(crate) fn encode(chunk: Option<ChunkRef>) -> u64 {
        chunk.map_or(0, ChunkRef::offset)
    }
}

impl fmt::Display for ChunkRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}
