//! Entry Module
//!
//! Content objects and the small codecs layered on the key space.
//!
//! ## Responsibilities
//! - Pair raw bytes with their SHA-1 digest and zlib-compressed form
//! - Allocate short random entry ids
//! - Encode multi-valued keys (dedup index, directory listings)
//!
//! ## Equality
//! Two entries are equal when their digests match and either their
//! compressed forms or their raw bytes match. The raw fallback covers
//! compressors that do not produce identical output for identical input.

mod digest;
mod dir;
mod id;
pub mod list;

pub use digest::{Digest, DIGEST_LEN};
pub use dir::{DirEntry, S_IFDIR, S_IFMT, S_IFREG};
pub use id::{allocate_id, tries_per_round, EntryId};

use crate::compress::{self, DEFAULT_LEVEL};
use crate::error::{PngDbError, Result};

/// A content object
#[derive(Debug, Clone, Default)]
pub struct DbEntry {
    raw: Vec<u8>,
    digest: Option<Digest>,
    compressed: Option<Vec<u8>>,
}

impl DbEntry {
    /// Wrap `raw` and prepare it for storage at the default level
    pub fn new(raw: impl Into<Vec<u8>>) -> Result<Self> {
        Self::with_level(raw, DEFAULT_LEVEL)
    }

    /// Wrap `raw` and prepare it for storage at the given zlib level
    pub fn with_level(raw: impl Into<Vec<u8>>, level: u32) -> Result<Self> {
        let mut entry = Self::unprepared(raw);
        entry.prepare(level)?;
        Ok(entry)
    }

    /// Wrap `raw` without computing digest or compressed form
    pub fn unprepared(raw: impl Into<Vec<u8>>) -> Self {
        Self {
            raw: raw.into(),
            digest: None,
            compressed: None,
        }
    }

    /// Rebuild an entry from stored bytes, re-deriving raw bytes and digest
    pub fn from_compressed(compressed: Vec<u8>) -> Result<Self> {
        let raw = compress::decompress(&compressed)?;
        let digest = Digest::of(&raw);
        Ok(Self {
            raw,
            digest: Some(digest),
            compressed: Some(compressed),
        })
    }

    pub fn compute_digest(&mut self) {
        self.digest = Some(Digest::of(&self.raw));
    }

    pub fn compress(&mut self, level: u32) -> Result<()> {
        self.compressed = Some(compress::compress(&self.raw, level)?);
        Ok(())
    }

    pub fn prepare(&mut self, level: u32) -> Result<()> {
        self.compute_digest();
        self.compress(level)
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.raw
    }

    pub fn digest(&self) -> Option<&Digest> {
        self.digest.as_ref()
    }

    pub fn compressed(&self) -> Option<&[u8]> {
        self.compressed.as_deref()
    }

    pub fn is_prepared(&self) -> bool {
        self.digest.is_some() && self.compressed.is_some()
    }

    /// Digest and compressed bytes, or `InvalidEntry` if either is missing
    pub fn storage_form(&self) -> Result<(&Digest, &[u8])> {
        let digest = self
            .digest
            .as_ref()
            .ok_or_else(|| PngDbError::InvalidEntry("entry SHA1 not calculated".to_string()))?;
        let compressed = self.compressed.as_deref().ok_or_else(|| {
            PngDbError::InvalidEntry("entry compression not calculated".to_string())
        })?;
        Ok((digest, compressed))
    }
}

impl PartialEq for DbEntry {
    fn eq(&self, other: &Self) -> bool {
        match (&self.digest, &other.digest) {
            (Some(a), Some(b)) if a == b => {
                let same_compressed = matches!(
                    (&self.compressed, &other.compressed),
                    (Some(x), Some(y)) if x == y
                );
                same_compressed || self.raw == other.raw
            }
            _ => false,
        }
    }
}
