//! Entry-list codec
//!
//! Several short values under one key, stored as `[len: u8][bytes]` repeated.
//! Lists only ever grow by appending one encoded item.

use bytes::BufMut;

use crate::codec::Decoder;
use crate::error::{PngDbError, Result};

/// Longest item a list can hold
pub const MAX_ITEM_LEN: usize = u8::MAX as usize;

/// Encode a single item, ready to be appended to a list value
pub fn encode_item(item: &[u8]) -> Result<Vec<u8>> {
    if item.len() > MAX_ITEM_LEN {
        return Err(PngDbError::InvalidEntry(format!(
            "cannot add entries with size {} > {} to list",
            item.len(),
            MAX_ITEM_LEN
        )));
    }
    let mut out = Vec::with_capacity(1 + item.len());
    out.put_u8(item.len() as u8);
    out.put_slice(item);
    Ok(out)
}

/// Encode a whole list
pub fn encode_list<I, T>(items: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut out = Vec::new();
    for item in items {
        out.extend_from_slice(&encode_item(item.as_ref())?);
    }
    Ok(out)
}

/// Split a list value back into its items
pub fn decode_list(bytes: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut d = Decoder::new(bytes, "entry list");
    let mut items = Vec::new();
    while !d.is_empty() {
        let len = d.u8()? as usize;
        items.push(d.bytes(len)?.to_vec());
    }
    Ok(items)
}
