//! Entry ids and their allocation
//!
//! Ids are random and as short as the store allows. Allocation tries a few
//! one-byte extensions of the current prefix; when a whole round collides,
//! the prefix itself grows by one random byte and the next round starts.
//!
//! ```text
//! Empty ──► Trying(prefix + b) ──► Bound
//!              │      ▲
//!   collision  └──────┘   (up to 2 << len(prefix) tries, at most 64)
//!              │
//!   round exhausted ──► Extend(prefix + r) ──► Trying(...)
//! ```

use std::fmt;

use rand::Rng;

use crate::error::{PngDbError, Result};

/// Opaque key of a stored entry: non-empty, never contains NUL
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(Vec<u8>);

impl EntryId {
    /// Validate raw id bytes
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(PngDbError::InvalidEntry("entry id is empty".to_string()));
        }
        if bytes.contains(&0) {
            return Err(PngDbError::InvalidEntry(format!(
                "entry id {} contains NUL",
                hex::encode_upper(&bytes)
            )));
        }
        Ok(EntryId(bytes))
    }

    /// Parse the hex form printed by `Display`
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| PngDbError::InvalidEntry(format!("entry id '{}': {}", s, e)))?;
        Self::from_bytes(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> String {
        hex::encode_upper(&self.0)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryId({})", self.to_hex())
    }
}

// =============================================================================
// Allocation
// =============================================================================

/// Candidates tried per round for a prefix of `prefix_len` bytes
pub fn tries_per_round(prefix_len: usize) -> usize {
    if prefix_len <= 4 {
        2 << prefix_len
    } else {
        64
    }
}

/// Find a free id by repeatedly offering candidates to `bind`
///
/// `bind` claims the candidate and returns `Ok(())`, or reports a taken slot
/// with `AlreadyExists`; any other error aborts allocation. After
/// `max_attempts` candidates the allocation fails with `ResourceExhausted`.
pub fn allocate_id<R, F>(rng: &mut R, max_attempts: usize, mut bind: F) -> Result<EntryId>
where
    R: Rng + ?Sized,
    F: FnMut(&EntryId) -> Result<()>,
{
    let mut prefix: Vec<u8> = Vec::new();
    let mut attempts = 0usize;

    loop {
        for _ in 0..tries_per_round(prefix.len()) {
            if attempts >= max_attempts {
                return Err(PngDbError::ResourceExhausted(format!(
                    "no free entry id after {} attempts",
                    attempts
                )));
            }
            attempts += 1;

            let mut candidate = prefix.clone();
            candidate.push(random_id_byte(rng));
            let id = EntryId(candidate);

            match bind(&id) {
                Ok(()) => return Ok(id),
                Err(PngDbError::AlreadyExists) => {
                    tracing::trace!(id = %id, "entry id collision");
                }
                Err(e) => return Err(e),
            }
        }

        prefix.push(random_id_byte(rng));
        tracing::debug!(prefix_len = prefix.len(), attempts, "extended entry id prefix");
    }
}

fn random_id_byte<R: Rng + ?Sized>(rng: &mut R) -> u8 {
    rng.gen_range(1..=u8::MAX)
}
