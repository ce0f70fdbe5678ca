//! Plain filesystem backend
//!
//! ## Layout
//! ```text
//! <root>/data/<HEX id[0]>/.../<HEX id[n-1]>.dat        compressed entry bytes
//! <root>/sha1refs/<10 HEX>/<10 HEX>/<10 HEX>/<10 HEX>/<HEX id>.ref
//!                                                      empty dedup markers
//! ```
//!
//! Ids are claimed by exclusive file creation, so a collision surfaces as
//! `AlreadyExists` exactly like an occupied key in the single-file backend.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::config::{Config, SyncStrategy};
use crate::entry::{allocate_id, DbEntry, Digest, EntryId};
use crate::error::{PngDbError, Result};

use super::{DbStats, Store};

const DATA_DIR: &str = "data";
const SHA1REFS_DIR: &str = "sha1refs";
const REF_SUFFIX: &str = ".ref";
/// Digest bytes per sha1refs directory level
const REF_GROUP: usize = 5;

/// Store with one regular file per entry under a root directory
pub struct FsBackend {
    config: Config,
    state: Mutex<FsState>,
}

#[derive(Default)]
struct FsState {
    initialized: bool,
    stats: DbStats,
}

impl FsBackend {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: Mutex::new(FsState::default()),
        }
    }

    /// Create and initialise in one step
    pub fn open(config: Config) -> Result<Self> {
        let backend = Self::new(config);
        backend.init()?;
        Ok(backend)
    }

    pub fn root(&self) -> &Path {
        &self.config.db_path
    }

    fn data_path(&self, id: &EntryId) -> PathBuf {
        let bytes = id.as_bytes();
        let mut path = self.root().join(DATA_DIR);
        let (last, dirs) = match bytes.split_last() {
            Some(split) => split,
            None => return path,
        };
        for b in dirs {
            path.push(format!("{:02X}", b));
        }
        path.push(format!("{:02X}.dat", last));
        path
    }

    fn sha1ref_dir(&self, digest: &Digest) -> PathBuf {
        let mut path = self.root().join(SHA1REFS_DIR);
        for group in digest.as_bytes().chunks(REF_GROUP) {
            path.push(hex::encode_upper(group));
        }
        path
    }

    fn ensure_init(&self, state: &FsState) -> Result<()> {
        if state.initialized {
            Ok(())
        } else {
            Err(PngDbError::NotInitialized)
        }
    }

    fn read_entry(&self, id: &EntryId) -> Result<DbEntry> {
        let path = self.data_path(id);
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(PngDbError::NotFound),
            Err(e) => return Err(e.into()),
        };
        let mut compressed = Vec::new();
        file.read_to_end(&mut compressed)?;
        DbEntry::from_compressed(compressed)
    }

    /// Ids recorded in a sha1refs directory; a missing directory has none
    fn ref_candidates(&self, dir: &Path) -> Result<Vec<EntryId>> {
        let listing = match fs::read_dir(dir) {
            Ok(listing) => listing,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        for dirent in listing {
            let name = dirent?.file_name();
            let Some(hex_id) = name.to_str().and_then(|n| n.strip_suffix(REF_SUFFIX)) else {
                continue;
            };
            match EntryId::from_hex(hex_id) {
                Ok(id) => ids.push(id),
                Err(e) => tracing::warn!(file = hex_id, error = %e, "ignoring stray sha1ref file"),
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Claim `id` by creating its data file; `AlreadyExists` if taken
    fn create_data_file(&self, id: &EntryId, compressed: &[u8]) -> Result<()> {
        let path = self.data_path(id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Err(PngDbError::AlreadyExists),
            Err(e) => return Err(e.into()),
        };
        file.write_all(compressed)?;
        if self.config.sync_strategy == SyncStrategy::EveryWrite {
            file.sync_data()?;
        }
        Ok(())
    }
}

impl Store for FsBackend {
    fn init(&self) -> Result<()> {
        self.config.validate()?;
        let root = self.root();
        if self.config.read_only {
            if !root.is_dir() {
                return Err(PngDbError::Config(format!(
                    "store directory {} does not exist",
                    root.display()
                )));
            }
        } else {
            fs::create_dir_all(root.join(DATA_DIR))?;
            fs::create_dir_all(root.join(SHA1REFS_DIR))?;
        }
        tracing::debug!(root = ?root, read_only = self.config.read_only, "opened filesystem store");
        self.state.lock().initialized = true;
        Ok(())
    }

    fn push(&self, entry: &DbEntry) -> Result<EntryId> {
        let mut state = self.state.lock();
        self.ensure_init(&state)?;
        if self.config.read_only {
            return Err(PngDbError::ReadOnly);
        }

        let (digest, compressed) = entry.storage_form()?;
        let ref_dir = self.sha1ref_dir(digest);

        for id in self.ref_candidates(&ref_dir)? {
            match self.read_entry(&id) {
                Ok(existing) if existing == *entry => {
                    state.stats.push_reuse += 1;
                    return Ok(id);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(id = %id, error = %e, "skipping unreadable dedup candidate"),
            }
        }

        let id = allocate_id(
            &mut rand::thread_rng(),
            self.config.max_id_attempts,
            |candidate| self.create_data_file(candidate, compressed),
        )?;

        fs::create_dir_all(&ref_dir)?;
        File::create(ref_dir.join(format!("{}{}", id.to_hex(), REF_SUFFIX)))?;

        state.stats.push_new += 1;
        tracing::trace!(id = %id, digest = %digest, "stored new entry file");
        Ok(id)
    }

    fn get(&self, id: &EntryId) -> Result<DbEntry> {
        self.ensure_init(&self.state.lock())?;
        self.read_entry(id)
    }

    fn stats(&self) -> DbStats {
        self.state.lock().stats
    }
}
