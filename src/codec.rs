//! Binary codec helpers
//!
//! Every on-disk field is a fixed-width big-endian integer. Encoding goes
//! through `bytes::BufMut` (`put_u8`, `put_u32`, `put_u64`, ...), which is
//! big-endian by default; decoding goes through [`Decoder`], which wraps
//! `bytes::Buf` with bounds checks so that a short buffer turns into a
//! `Format` error instead of a panic.
//!
//! Record integrity uses CRC-32 (the PNG/zlib polynomial), computed over one
//! or two buffers.

use bytes::Buf;

use crate::error::{PngDbError, Result};

// =============================================================================
// Checksums
// =============================================================================

/// CRC-32 over a single buffer
pub fn checksum(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// CRC-32 over the concatenation of two buffers, without concatenating them
pub fn checksum2(first: &[u8], second: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(first);
    hasher.update(second);
    hasher.finalize()
}

// =============================================================================
// Decoding
// =============================================================================

/// Bounds-checked big-endian reader over a byte slice
pub struct Decoder<'a> {
    buf: &'a [u8],
    /// Name of the structure being decoded, used in error messages
    what: &'static str,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8], what: &'static str) -> Self {
        Self { buf, what }
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn u8(&mut self) -> Result<u8> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn u16(&mut self) -> Result<u16> {
        self.need(2)?;
        Ok(self.buf.get_u16())
    }

    pub fn u32(&mut self) -> Result<u32> {
        self.need(4)?;
        Ok(self.buf.get_u32())
    }

    pub fn u64(&mut self) -> Result<u64> {
        self.need(8)?;
        Ok(self.buf.get_u64())
    }

    /// Take the next `len` bytes as a borrowed slice
    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.need(len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    fn need(&self, len: usize) -> Result<()> {
        if self.buf.remaining() < len {
            return Err(PngDbError::format(format!(
                "{}: truncated (need {} bytes, have {})",
                self.what,
                len,
                self.buf.remaining()
            )));
        }
        Ok(())
    }
}
