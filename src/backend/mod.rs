//! Backend Module
//!
//! Storage backends behind one abstract store interface.
//!
//! ## Backends
//! - [`FileBackend`]: everything in one file, keyed through the chunk trie
//! - [`FsBackend`]: one regular file per entry plus `.ref` marker files
//!
//! ## Key Space (FileBackend)
//! ```text
//! "data."    + id      → compressed entry bytes
//! "sha1ref." + digest  → entry list of ids sharing that digest
//! "fs."      + path    → entry list of dir records, or a file's content id
//! ```

mod file;
mod fs;

pub use file::FileBackend;
pub use fs::FsBackend;

use crate::entry::{DbEntry, DirEntry, EntryId};
use crate::error::{PngDbError, Result};

/// Push counters, kept per backend instance and never persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DbStats {
    /// Pushes that stored new content
    pub push_new: u64,
    /// Pushes answered with an existing id
    pub push_reuse: u64,
}

impl DbStats {
    /// Fraction of pushes that were deduplicated (0.0 when nothing was pushed)
    pub fn reuse_ratio(&self) -> f64 {
        let total = self.push_new + self.push_reuse;
        if total == 0 {
            return 0.0;
        }
        self.push_reuse as f64 / total as f64
    }
}

/// The abstract content-addressable store
///
/// The directory and file-reference methods are optional; backends that do
/// not support a virtual path hierarchy keep the `NotImplemented` defaults.
pub trait Store: Send + Sync {
    /// Open or create the underlying storage
    fn init(&self) -> Result<()>;

    /// Store a prepared entry, reusing an identical one if present
    fn push(&self, entry: &DbEntry) -> Result<EntryId>;

    /// Fetch, decompress and re-digest an entry
    fn get(&self, id: &EntryId) -> Result<DbEntry>;

    /// Push counters since construction
    fn stats(&self) -> DbStats;

    /// Add a record to the listing of `path`
    fn push_to_dir(&self, _path: &str, _entry: &DirEntry) -> Result<()> {
        Err(PngDbError::NotImplemented("push_to_dir"))
    }

    /// All records pushed to `path`, in push order
    fn get_dir(&self, _path: &str) -> Result<Vec<DirEntry>> {
        Err(PngDbError::NotImplemented("get_dir"))
    }

    /// Bind `path` to a content id (`None` for an empty file)
    fn set_file_ref(&self, _id: Option<&EntryId>, _path: &str) -> Result<()> {
        Err(PngDbError::NotImplemented("set_file_ref"))
    }

    /// The content id bound to `path`
    fn get_file_ref(&self, _path: &str) -> Result<Option<EntryId>> {
        Err(PngDbError::NotImplemented("get_file_ref"))
    }

    /// Whether `path` is bound; only a missing binding counts as `false`
    fn has_file_ref(&self, path: &str) -> Result<bool> {
        match self.get_file_ref(path) {
            Ok(_) => Ok(true),
            Err(PngDbError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
