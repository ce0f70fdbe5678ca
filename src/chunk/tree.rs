//! Tree chunks
//!
//! One node of the on-disk trie. A node has eight slots; each slot is empty,
//! a subtree keyed by a key prefix, or a value keyed by the exact remaining
//! key. Slots are kept sorted by (kind, key part) with empty slots first.
//!
//! A full node splits before an insert: its upper four slots move verbatim
//! into a new sibling node, and a subtree slot with an empty key part (a
//! catch-all that matches every key) points at the sibling.

use std::cmp::Ordering;
use std::collections::HashSet;

use bytes::BufMut;

use crate::codec::{checksum, Decoder};
use crate::error::{PngDbError, Result};

use super::{ChunkFile, ChunkRef, ValueChunk, CHUNK_TYPE_TREE};

/// Slots per tree chunk
pub const NUM_SLOTS: usize = 8;

/// Longest key part a slot can hold
pub const KEY_PART_LIMIT: usize = 4;

/// Key part length for intermediate subtrees. Key parts can never be made
/// shorter or longer once written, so one byte is the only safe choice.
const SUBTREE_KEY_LEN: usize = 1;

/// Bitfield (1) + refs (8 × 8) + keys (8 × (1 + 4)) = 105
const PAYLOAD_LEN: usize = 1 + NUM_SLOTS * 8 + NUM_SLOTS * (1 + KEY_PART_LIMIT);

/// Type (1) + length (4) + payload + CRC (4) = 114
pub(crate) const RECORD_LEN: usize = 1 + 4 + PAYLOAD_LEN + 4;

// =============================================================================
// Slots
// =============================================================================

/// One entry of a tree chunk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Slot {
    #[default]
    Empty,
    Subtree {
        key_part: Vec<u8>,
        child: ChunkRef,
    },
    Value {
        key_part: Vec<u8>,
        value: ChunkRef,
    },
}

impl Slot {
    pub fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }

    pub fn key_part(&self) -> &[u8] {
        match self {
            Slot::Empty => &[],
            Slot::Subtree { key_part, .. } | Slot::Value { key_part, .. } => key_part,
        }
    }

    pub fn target(&self) -> Option<ChunkRef> {
        match self {
            Slot::Empty => None,
            Slot::Subtree { child, .. } => Some(*child),
            Slot::Value { value, .. } => Some(*value),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Slot::Empty => 0,
            Slot::Subtree { .. } => 1,
            Slot::Value { .. } => 2,
        }
    }

    /// Ordering within a chunk: (kind, key part)
    fn order(&self, other: &Slot) -> Ordering {
        (self.rank(), self.key_part()).cmp(&(other.rank(), other.key_part()))
    }
}

/// How `get_value` treats a missing key
///
/// The creating modes carry the new value's first payload: the value chunk
/// is written before any slot that links to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    /// Fail with `NotFound`
    Existing,
    /// Create the value holding these bytes if missing
    OrCreate(&'a [u8]),
    /// Create the value holding these bytes; fail with `AlreadyExists` if
    /// it is present
    CreateNew(&'a [u8]),
}

/// What `get_value` resolved a key to
#[derive(Debug, Clone)]
pub enum Located {
    /// The key already had a value
    Found(ValueChunk),
    /// A new value was written with the lookup's payload
    Created(ValueChunk),
}

impl Located {
    pub fn was_created(&self) -> bool {
        matches!(self, Located::Created(_))
    }

    pub fn into_chunk(self) -> ValueChunk {
        match self {
            Located::Found(chunk) | Located::Created(chunk) => chunk,
        }
    }
}

// =============================================================================
// Tree Chunk
// =============================================================================

/// One node of the trie, addressed by its file offset
#[derive(Debug, Clone)]
pub struct TreeChunk {
    offset: ChunkRef,
    slots: [Slot; NUM_SLOTS],
}

impl TreeChunk {
    /// An empty node at `offset` (not written yet)
    pub fn new(offset: ChunkRef) -> Self {
        Self {
            offset,
            slots: std::array::from_fn(|_| Slot::Empty),
        }
    }

    pub fn offset(&self) -> ChunkRef {
        self.offset
    }

    pub fn slots(&self) -> &[Slot; NUM_SLOTS] {
        &self.slots
    }

    /// Number of non-empty slots
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_empty()).count()
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Resolve `key` to the head of its value chain
    ///
    /// Every subtree whose key part prefixes the key is searched (most
    /// specific first) before the key is declared missing. A new value is
    /// created at the end of the most specific path.
    pub fn get_value(
        &mut self,
        file: &mut ChunkFile,
        key: &[u8],
        mode: Lookup<'_>,
    ) -> Result<Located> {
        if let Some(at) = self.find(file, key)? {
            if let Lookup::CreateNew(_) = mode {
                return Err(PngDbError::AlreadyExists);
            }
            return ValueChunk::read(file, at).map(Located::Found);
        }
        let initial = match mode {
            Lookup::Existing => return Err(PngDbError::NotFound),
            Lookup::OrCreate(initial) | Lookup::CreateNew(initial) => initial,
        };

        let Some((child, used)) = self.best_subtree(key) else {
            return self.create_here(file, key, initial).map(Located::Created);
        };
        let mut node = TreeChunk::read(file, child)?;
        let mut rest = &key[used..];
        while let Some((child, used)) = node.best_subtree(rest) {
            node = TreeChunk::read(file, child)?;
            rest = &rest[used..];
        }
        node.create_here(file, rest, initial).map(Located::Created)
    }

    /// Depth-first search for an exact value slot
    fn find(&self, file: &mut ChunkFile, key: &[u8]) -> Result<Option<ChunkRef>> {
        if let Some(at) = self.value_for(key) {
            return Ok(Some(at));
        }

        // slots are sorted, so the most specific prefix is pushed last
        let mut pending: Vec<(ChunkRef, usize)> = self.matching_subtrees(key).collect();
        let mut seen = HashSet::from([self.offset]);
        while let Some((at, used)) = pending.pop() {
            if !seen.insert(at) {
                return Err(PngDbError::format(format!(
                    "tree chunk {} reached twice",
                    at
                )));
            }
            let node = TreeChunk::read(file, at)?;
            let rest = &key[used..];
            if let Some(value) = node.value_for(rest) {
                return Ok(Some(value));
            }
            pending.extend(
                node.matching_subtrees(rest)
                    .map(|(child, len)| (child, used + len)),
            );
        }
        Ok(None)
    }

    fn value_for(&self, key: &[u8]) -> Option<ChunkRef> {
        self.slots.iter().find_map(|slot| match slot {
            Slot::Value { key_part, value } if key_part.as_slice() == key => Some(*value),
            _ => None,
        })
    }

    /// Subtrees whose key part prefixes `key`, in slot order
    fn matching_subtrees<'a>(
        &'a self,
        key: &'a [u8],
    ) -> impl Iterator<Item = (ChunkRef, usize)> + 'a {
        self.slots.iter().filter_map(move |slot| match slot {
            Slot::Subtree { key_part, child } if key.starts_with(key_part) => {
                Some((*child, key_part.len()))
            }
            _ => None,
        })
    }

    /// The matching subtree with the longest key part
    fn best_subtree(&self, key: &[u8]) -> Option<(ChunkRef, usize)> {
        self.matching_subtrees(key).max_by_key(|(_, len)| *len)
    }

    // =========================================================================
    // Insertion
    // =========================================================================

    /// Create a value for `key` in this node, adding intermediate subtrees
    /// while the key is longer than a slot can hold
    ///
    /// Everything below this node is on disk before this node's slot is: a
    /// failed write leaves at most unreachable chunks behind.
    fn create_here(
        &mut self,
        file: &mut ChunkFile,
        key: &[u8],
        initial: &[u8],
    ) -> Result<ValueChunk> {
        let (slot, chunk) = if key.len() > KEY_PART_LIMIT {
            let (part, rest) = key.split_at(SUBTREE_KEY_LEN);
            // reserve the subtree's space before its contents are allocated
            let mut subtree = TreeChunk::new(file.alloc()?);
            subtree.write(file)?;
            let chunk = subtree.create_here(file, rest, initial)?;
            let slot = Slot::Subtree {
                key_part: part.to_vec(),
                child: subtree.offset,
            };
            (slot, chunk)
        } else {
            let chunk = ValueChunk::create(file, initial)?;
            let slot = Slot::Value {
                key_part: key.to_vec(),
                value: chunk.offset(),
            };
            (slot, chunk)
        };

        self.split_if_needed(file)?;
        self.insert(file, slot)?;
        Ok(chunk)
    }

    /// Move the upper half into a new sibling if every slot is taken
    ///
    /// Leaves the node unsorted and unwritten; `insert` follows immediately.
    fn split_if_needed(&mut self, file: &mut ChunkFile) -> Result<()> {
        if self.occupied() < NUM_SLOTS {
            return Ok(());
        }

        let mut sibling = TreeChunk::new(file.alloc()?);
        for i in NUM_SLOTS / 2..NUM_SLOTS {
            sibling.slots[i] = std::mem::take(&mut self.slots[i]);
        }
        sibling.write(file)?;
        tracing::debug!(node = %self.offset, sibling = %sibling.offset, "split tree chunk");

        // a catch-all cannot exist yet: lookups would have descended into it
        let free = self.first_free().ok_or_else(|| {
            PngDbError::format(format!("tree chunk {}: no free slot after split", self.offset))
        })?;
        self.slots[free] = Slot::Subtree {
            key_part: Vec::new(),
            child: sibling.offset,
        };
        Ok(())
    }

    fn insert(&mut self, file: &mut ChunkFile, slot: Slot) -> Result<()> {
        let free = self.first_free().ok_or_else(|| {
            PngDbError::format(format!("tree chunk {}: insert into full chunk", self.offset))
        })?;
        self.slots[free] = slot;
        self.slots.sort_by(Slot::order);
        self.write(file)
    }

    fn first_free(&self) -> Option<usize> {
        self.slots.iter().position(Slot::is_empty)
    }

    // =========================================================================
    // Record I/O
    // =========================================================================

    pub fn write(&self, file: &mut ChunkFile) -> Result<()> {
        let record = self.encode()?;
        file.write_at(self.offset.offset(), &record)
    }

    fn encode(&self) -> Result<Vec<u8>> {
        let mut payload = Vec::with_capacity(PAYLOAD_LEN);

        let mut value_bits = 0u8;
        for (i, slot) in self.slots.iter().enumerate() {
            if matches!(slot, Slot::Value { .. }) {
                value_bits |= 1 << i;
            }
        }
        payload.put_u8(value_bits);

        for slot in &self.slots {
            payload.put_u64(ChunkRef::encode(slot.target()));
        }

        for slot in &self.slots {
            let key_part = slot.key_part();
            if key_part.len() > KEY_PART_LIMIT {
                return Err(PngDbError::format(format!(
                    "tree chunk {}: key part of {} bytes too big",
                    self.offset,
                    key_part.len()
                )));
            }
            payload.put_u8(key_part.len() as u8);
            payload.put_slice(key_part);
            payload.put_bytes(0, KEY_PART_LIMIT - key_part.len());
        }

        let mut record = Vec::with_capacity(RECORD_LEN);
        record.put_u8(CHUNK_TYPE_TREE);
        record.put_u32(PAYLOAD_LEN as u32);
        record.put_slice(&payload);
        record.put_u32(checksum(&payload));
        Ok(record)
    }

    /// Load and validate the chunk at `at`
    pub fn read(file: &mut ChunkFile, at: ChunkRef) -> Result<Self> {
        let header = file.read_vec(at.offset(), 5, "tree chunk")?;
        let mut d = Decoder::new(&header, "tree chunk header");
        if d.u8()? != CHUNK_TYPE_TREE {
            return Err(PngDbError::format(format!(
                "tree chunk {}: chunk type invalid",
                at
            )));
        }
        let len = d.u32()? as usize;
        if len != PAYLOAD_LEN {
            return Err(PngDbError::format(format!(
                "tree chunk {}: data size mismatch ({} != {})",
                at, len, PAYLOAD_LEN
            )));
        }

        let body = file.read_vec(at.offset() + 5, PAYLOAD_LEN + 4, "tree chunk")?;
        let mut d = Decoder::new(&body, "tree chunk");
        let payload = d.bytes(PAYLOAD_LEN)?;
        if d.u32()? != checksum(payload) {
            return Err(PngDbError::format(format!(
                "tree chunk {}: CRC mismatch",
                at
            )));
        }

        Self::decode(at, payload)
    }

    fn decode(at: ChunkRef, payload: &[u8]) -> Result<Self> {
        let mut d = Decoder::new(payload, "tree chunk");
        let value_bits = d.u8()?;

        let mut targets = [None; NUM_SLOTS];
        for target in &mut targets {
            *target = ChunkRef::new(d.u64()?);
        }

        let mut chunk = TreeChunk::new(at);
        for i in 0..NUM_SLOTS {
            let len = d.u8()? as usize;
            let key_buf = d.bytes(KEY_PART_LIMIT)?;
            if len > KEY_PART_LIMIT {
                return Err(PngDbError::format(format!(
                    "tree chunk {}: key size {} invalid",
                    at, len
                )));
            }
            let key_part = key_buf[..len].to_vec();

            chunk.slots[i] = match targets[i] {
                None => Slot::Empty,
                Some(value) if value_bits & (1 << i) != 0 => Slot::Value { key_part, value },
                Some(child) => Slot::Subtree { key_part, child },
            };

            if i > 0 && !chunk.slots[i - 1].is_empty() {
                match chunk.slots[i - 1].order(&chunk.slots[i]) {
                    Ordering::Less => {}
                    Ordering::Equal => {
                        return Err(PngDbError::format(format!(
                            "tree chunk {}: keys inconsistent (double entry)",
                            at
                        )))
                    }
                    Ordering::Greater => {
                        return Err(PngDbError::format(format!(
                            "tree chunk {}: keys inconsistent (not in order)",
                            at
                        )))
                    }
                }
            }
        }

        Ok(chunk)
    }
}
