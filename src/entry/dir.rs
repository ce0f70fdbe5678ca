//! Directory entries for the virtual path hierarchy
//!
//! Record format: `[mode: u16][size: u32][name]`, big-endian.

use bytes::BufMut;

use crate::codec::Decoder;
use crate::error::{PngDbError, Result};

pub const S_IFMT: u16 = 0o170000;
pub const S_IFREG: u16 = 0o100000;
pub const S_IFDIR: u16 = 0o040000;

/// mode (2) + size (4)
const HEADER_LEN: usize = 6;

/// One listing line: what a directory contains
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub mode: u16,
    pub size: u32,
    pub name: String,
}

impl DirEntry {
    /// A read-only regular file
    pub fn file(name: impl Into<String>, size: u32) -> Self {
        Self {
            mode: S_IFREG | 0o444,
            size,
            name: name.into(),
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            mode: S_IFDIR | 0o755,
            size: 0,
            name: name.into(),
        }
    }

    pub fn is_file(&self) -> bool {
        self.mode & S_IFMT == S_IFREG
    }

    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.name.len());
        out.put_u16(self.mode);
        out.put_u32(self.size);
        out.put_slice(self.name.as_bytes());
        out
    }

    pub fn deserialize(raw: &[u8]) -> Result<Self> {
        if raw.len() <= HEADER_LEN {
            return Err(PngDbError::format(format!(
                "dir entry of {} bytes has no name",
                raw.len()
            )));
        }
        let mut d = Decoder::new(raw, "dir entry");
        let mode = d.u16()?;
        let size = d.u32()?;
        let name = String::from_utf8(d.bytes(d.remaining())?.to_vec())
            .map_err(|_| PngDbError::format("dir entry name is not valid UTF-8"))?;
        Ok(Self { mode, size, name })
    }
}
