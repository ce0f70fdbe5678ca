//! Compression codec
//!
//! Entries are stored as zlib streams (DEFLATE with the zlib header and
//! Adler-32 trailer). Compression is not guaranteed to be byte-for-byte
//! deterministic across library versions, which is why entry equality falls
//! back to comparing raw bytes.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};

use crate::error::{DecodeError, Result};

/// Default zlib level (best compression)
pub const DEFAULT_LEVEL: u32 = 9;

/// Output growth step while inflating
const INFLATE_STEP: usize = 128 * 1024;

/// Compress `raw` into a zlib stream at the given level (clamped to 9)
pub fn compress(raw: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(
        Vec::with_capacity(raw.len() / 2 + 64),
        Compression::new(level.min(9)),
    );
    encoder.write_all(raw)?;
    Ok(encoder.finish()?)
}

/// Inflate a complete zlib stream
///
/// Failure states:
/// - `NeedDictionary`: the stream was built against a preset dictionary
/// - `Data`: corrupt or non-zlib input
/// - `OutOfMemory`: the output buffer could not grow
/// - `Incomplete`: input ended before the end-of-stream marker
/// - `Stream`: the inflater stopped making progress with input and output space left
pub fn decompress(compressed: &[u8]) -> std::result::Result<Vec<u8>, DecodeError> {
    let mut inflater = Decompress::new(true);
    let mut out: Vec<u8> = Vec::new();

    loop {
        if out.len() == out.capacity() {
            let step = INFLATE_STEP.max(out.len());
            out.try_reserve(step).map_err(|_| DecodeError::OutOfMemory)?;
        }

        let consumed = inflater.total_in() as usize;
        let produced = inflater.total_out();
        let status = inflater
            .decompress_vec(&compressed[consumed..], &mut out, FlushDecompress::None)
            .map_err(|e| match e.needs_dictionary() {
                Some(_) => DecodeError::NeedDictionary,
                None => DecodeError::Data,
            })?;

        if status == Status::StreamEnd {
            return Ok(out);
        }

        let progressed =
            inflater.total_in() as usize != consumed || inflater.total_out() != produced;
        if !progressed && out.len() < out.capacity() {
            if inflater.total_in() as usize >= compressed.len() {
                return Err(DecodeError::Incomplete);
            }
            return Err(DecodeError::Stream);
        }
    }
}
