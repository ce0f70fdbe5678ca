//! Value chunks
//!
//! A value is a chain of chunks. The head lives at the offset the tree
//! points to; each chunk holds at most `initial_size` bytes (its capacity
//! when first written) and may point at a continuation chunk.

use std::collections::HashSet;

use bytes::BufMut;

use crate::codec::{checksum2, Decoder};
use crate::error::{PngDbError, Result};

use super::{ChunkFile, ChunkRef, CHUNK_TYPE_VALUE};

/// Type (1) + payload length (4)
const HEADER_LEN: usize = 5;

/// Initial size (4) + continuation (8)
const TRAILER_LEN: usize = 12;

const CRC_LEN: usize = 4;

/// One link of a value chain
#[derive(Debug, Clone)]
pub struct ValueChunk {
    offset: ChunkRef,
    data: Vec<u8>,
    /// Capacity fixed by the first write
    initial_size: u32,
    next: Option<ChunkRef>,
    written: bool,
}

impl ValueChunk {
    /// A chunk reserved at `offset` that has not hit the disk yet
    fn unwritten(offset: ChunkRef) -> Self {
        Self {
            offset,
            data: Vec::new(),
            initial_size: 0,
            next: None,
            written: false,
        }
    }

    /// Write a single-chunk value holding `bytes` at the end of the file
    pub fn create(file: &mut ChunkFile, bytes: &[u8]) -> Result<Self> {
        let mut chunk = Self::unwritten(file.alloc()?);
        chunk.data = bytes.to_vec();
        chunk.write(file)?;
        Ok(chunk)
    }

    pub fn offset(&self) -> ChunkRef {
        self.offset
    }

    /// This chunk's own payload (not including continuations)
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn initial_size(&self) -> u32 {
        self.initial_size
    }

    pub fn next(&self) -> Option<ChunkRef> {
        self.next
    }

    // =========================================================================
    // Record I/O
    // =========================================================================

    /// Serialize at the chunk's offset; the first write fixes `initial_size`
    pub fn write(&mut self, file: &mut ChunkFile) -> Result<()> {
        if !self.written {
            self.initial_size = u32::try_from(self.data.len()).map_err(|_| {
                PngDbError::InvalidEntry(format!(
                    "value of {} bytes exceeds the chunk size limit",
                    self.data.len()
                ))
            })?;
            self.written = true;
        }

        let mut trailer = Vec::with_capacity(TRAILER_LEN);
        trailer.put_u32(self.initial_size);
        trailer.put_u64(ChunkRef::encode(self.next));
        let crc = checksum2(&self.data, &trailer);

        let mut record =
            Vec::with_capacity(HEADER_LEN + self.data.len() + TRAILER_LEN + CRC_LEN);
        record.put_u8(CHUNK_TYPE_VALUE);
        record.put_u32(self.data.len() as u32);
        record.put_slice(&self.data);
        record.put_slice(&trailer);
        record.put_u32(crc);

        file.write_at(self.offset.offset(), &record)
    }

    /// Load and validate the chunk at `at`
    pub fn read(file: &mut ChunkFile, at: ChunkRef) -> Result<Self> {
        let header = file.read_vec(at.offset(), HEADER_LEN, "value chunk")?;
        let mut d = Decoder::new(&header, "value chunk header");
        if d.u8()? != CHUNK_TYPE_VALUE {
            return Err(PngDbError::format(format!(
                "value chunk {}: chunk type invalid",
                at
            )));
        }
        let len = d.u32()? as usize;

        let body = file.read_vec(
            at.offset() + HEADER_LEN as u64,
            len + TRAILER_LEN + CRC_LEN,
            "value chunk",
        )?;
        let mut d = Decoder::new(&body, "value chunk");
        let data = d.bytes(len)?;
        let trailer = &body[len..len + TRAILER_LEN];
        let initial_size = d.u32()?;
        if (initial_size as usize) < len {
            return Err(PngDbError::format(format!(
                "value chunk {}: initial size {} below payload length {}",
                at, initial_size, len
            )));
        }
        let next = ChunkRef::new(d.u64()?);
        let crc = d.u32()?;

        if crc != checksum2(data, trailer) {
            return Err(PngDbError::format(format!(
                "value chunk {}: CRC mismatch",
                at
            )));
        }

        Ok(Self {
            offset: at,
            data: data.to_vec(),
            initial_size,
            next,
            written: true,
        })
    }

    // =========================================================================
    // Chain Operations
    // =========================================================================

    /// Concatenate the payloads of the whole chain
    pub fn get_data(&self, file: &mut ChunkFile) -> Result<Vec<u8>> {
        let mut out = self.data.clone();
        let mut chain = ChainWalk::new(self);
        let mut next = self.next;
        while let Some(at) = next {
            let chunk = chain.load(file, at)?;
            out.extend_from_slice(&chunk.data);
            next = chunk.next;
        }
        Ok(out)
    }

    /// Append `bytes` to the end of the chain
    ///
    /// Fills the tail chunk up to its initial size; anything that does not
    /// fit goes into a fresh continuation chunk at the end of the file.
    pub fn append_data(&mut self, file: &mut ChunkFile, bytes: &[u8]) -> Result<()> {
        let Some(mut next) = self.next else {
            return self.append_local(file, bytes);
        };
        let mut chain = ChainWalk::new(self);
        loop {
            let mut chunk = chain.load(file, next)?;
            match chunk.next {
                None => return chunk.append_local(file, bytes),
                Some(at) => next = at,
            }
        }
    }

    /// Replace the chain's contents with `bytes`
    ///
    /// Each chunk keeps up to its initial size; the remainder moves down the
    /// chain. When the data fits before the end of the chain, the rest of the
    /// chain is unlinked and its space is leaked.
    pub fn overwrite_data(&mut self, file: &mut ChunkFile, bytes: &[u8]) -> Result<()> {
        let Some(rest) = self.overwrite_local(file, bytes)? else {
            return Ok(());
        };
        let Some(next) = self.next else {
            return self.attach_continuation(file, rest);
        };

        let mut chain = ChainWalk::new(self);
        let mut chunk = chain.load(file, next)?;
        let mut rest = rest;
        loop {
            let Some(tail) = chunk.overwrite_local(file, rest)? else {
                return Ok(());
            };
            match chunk.next {
                None => return chunk.attach_continuation(file, tail),
                Some(at) => {
                    chunk = chain.load(file, at)?;
                    rest = tail;
                }
            }
        }
    }

    /// Append within this chunk (which must be the tail of its chain)
    fn append_local(&mut self, file: &mut ChunkFile, bytes: &[u8]) -> Result<()> {
        if self.data.len() + bytes.len() <= self.initial_size as usize {
            self.data.extend_from_slice(bytes);
            return self.write(file);
        }
        self.attach_continuation(file, bytes)
    }

    /// Store this chunk's share of `bytes`, returning what is left over
    fn overwrite_local<'b>(
        &mut self,
        file: &mut ChunkFile,
        bytes: &'b [u8],
    ) -> Result<Option<&'b [u8]>> {
        if bytes.len() <= self.initial_size as usize {
            // drops the continuation; its chunks stay allocated but unreachable
            self.next = None;
            self.data = bytes.to_vec();
            self.write(file)?;
            return Ok(None);
        }

        let (head, tail) = bytes.split_at(self.initial_size as usize);
        self.data = head.to_vec();
        self.write(file)?;
        Ok(Some(tail))
    }

    /// Write `bytes` into a new chunk at the end of the file and link it
    fn attach_continuation(&mut self, file: &mut ChunkFile, bytes: &[u8]) -> Result<()> {
        let continuation = ValueChunk::create(file, bytes)?;
        tracing::debug!(
            chunk = %self.offset,
            continuation = %continuation.offset,
            len = bytes.len(),
            "allocated continuation chunk"
        );

        self.next = Some(continuation.offset);
        self.write(file)
    }
}

/// Follows a continuation chain, rejecting loops
struct ChainWalk {
    seen: HashSet<ChunkRef>,
}

impl ChainWalk {
    fn new(head: &ValueChunk) -> Self {
        Self {
            seen: HashSet::from([head.offset]),
        }
    }

    fn load(&mut self, file: &mut ChunkFile, at: ChunkRef) -> Result<ValueChunk> {
        if !self.seen.insert(at) {
            return Err(PngDbError::format(format!(
                "value chain loops back to {}",
                at
            )));
        }
        ValueChunk::read(file, at)
    }
}
