//! Chunk file
//!
//! The one gateway through which chunk records reach the disk. Tracks the
//! file-size high-water mark, which doubles as the allocation pointer.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{PngDbError, Result};

use super::{ChunkRef, TreeChunk, ValueChunk};

/// Open database file plus its current size
///
/// Not synchronized: the owning backend serializes access.
pub struct ChunkFile {
    path: PathBuf,
    file: File,
    /// High-water mark; the next chunk is allocated here
    size: u64,
    read_only: bool,
}

impl ChunkFile {
    /// Open (or, unless read-only, create) the database file
    pub fn open(path: &Path, read_only: bool) -> Result<Self> {
        let file = if read_only {
            OpenOptions::new().read(true).open(path)?
        } else {
            OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)?
        };
        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            size,
            read_only,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Reserve the next chunk location (end of file)
    ///
    /// The location becomes occupied once something is written there; two
    /// allocations without a write in between return the same offset.
    pub fn alloc(&self) -> Result<ChunkRef> {
        ChunkRef::new(self.size)
            .ok_or_else(|| PngDbError::format("cannot allocate a chunk in an uninitialised file"))
    }

    /// Write `bytes` at `offset`, growing the high-water mark as needed
    pub fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        if self.read_only {
            return Err(PngDbError::ReadOnly);
        }
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(bytes)?;
        self.size = self.size.max(offset + bytes.len() as u64);
        Ok(())
    }

    /// Fill `buf` from `offset`; short reads are format errors
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8], what: &'static str) -> Result<()> {
        self.check_bounds(offset, buf.len() as u64, what)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                PngDbError::format(format!("{} at @{}: truncated record", what, offset))
            }
            _ => PngDbError::Io(e),
        })
    }

    /// Read `len` bytes from `offset`, checking bounds before allocating
    pub fn read_vec(&mut self, offset: u64, len: usize, what: &'static str) -> Result<Vec<u8>> {
        self.check_bounds(offset, len as u64, what)?;
        let mut buf = vec![0u8; len];
        self.read_at(offset, &mut buf, what)?;
        Ok(buf)
    }

    /// Flush file contents to stable storage
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }

    // =========================================================================
    // Typed Accessors
    // =========================================================================

    pub fn read_tree(&mut self, at: ChunkRef) -> Result<TreeChunk> {
        TreeChunk::read(self, at)
    }

    pub fn read_value(&mut self, at: ChunkRef) -> Result<ValueChunk> {
        ValueChunk::read(self, at)
    }

    fn check_bounds(&self, offset: u64, len: u64, what: &'static str) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(PngDbError::format(format!(
                "{} at @{}: truncated record ({} bytes past end of file)",
                what,
                offset,
                offset.saturating_add(len).saturating_sub(self.size)
            ))),
        }
    }
}
