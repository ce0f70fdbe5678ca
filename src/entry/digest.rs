//! SHA-1 content digest

use std::fmt;

use sha1::{Digest as _, Sha1};

/// Size of a digest in bytes
pub const DIGEST_LEN: usize = 20;

/// SHA-1 of an entry's raw bytes; the deduplication key
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    /// Hash `data`
    pub fn of(data: &[u8]) -> Self {
        let hash = Sha1::digest(data);
        let mut out = [0u8; DIGEST_LEN];
        out.copy_from_slice(&hash);
        Digest(out)
    }

    pub fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Digest(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}
