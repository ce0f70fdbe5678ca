//! Single-file backend
//!
//! Keys are resolved through the chunk trie rooted at a fixed offset. The
//! root chunk is cached in memory; all other chunks are read on demand.

use std::path::Path;

use parking_lot::Mutex;

use crate::chunk::{ChunkFile, ChunkRef, Located, Lookup, TreeChunk, SIGNATURE};
use crate::config::{Config, SyncStrategy};
use crate::entry::{allocate_id, list, DbEntry, Digest, DirEntry, EntryId};
use crate::error::{PngDbError, Result};

use super::{DbStats, Store};

const DATA_PREFIX: &[u8] = b"data.";
const SHA1REF_PREFIX: &[u8] = b"sha1ref.";
const FS_PREFIX: &[u8] = b"fs.";

/// Store backed by one database file
///
/// ## Concurrency
/// One mutex guards the open file, the cached root chunk and the counters.
/// Every key operation holds it for its full duration, and `push` holds it
/// across its lookup-then-write sequence.
pub struct FileBackend {
    config: Config,
    state: Mutex<State>,
}

struct State {
    db: Option<OpenDb>,
    stats: DbStats,
}

/// An initialised database file
struct OpenDb {
    file: ChunkFile,
    root: TreeChunk,
    sync: SyncStrategy,
}

impl FileBackend {
    /// Create a backend; no I/O happens until `init`
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: Mutex::new(State {
                db: None,
                stats: DbStats::default(),
            }),
        }
    }

    /// Create and initialise in one step
    pub fn open(config: Config) -> Result<Self> {
        let backend = Self::new(config);
        backend.init()?;
        Ok(backend)
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified database file
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().db_path(path).build())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current size of the database file
    pub fn file_size(&self) -> Result<u64> {
        self.with_db(|db, _| Ok(db.file.len()))
    }

    // =========================================================================
    // Generic Key Operations
    // =========================================================================

    /// Value bound to `key`, or `NotFound`
    pub fn get_raw(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.with_db(|db, _| db.get(key))
    }

    /// Bind `key` to `value`, replacing any previous value
    pub fn set_raw(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.with_db(|db, _| db.set(key, value))
    }

    /// Bind `key` to `value`; `AlreadyExists` if it is already bound
    pub fn add_raw(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.with_db(|db, _| db.add(key, value))
    }

    /// Append `value` to the value of `key`, creating it if needed
    pub fn append_raw(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.with_db(|db, _| db.append(key, value))
    }

    fn with_db<T>(&self, op: impl FnOnce(&mut OpenDb, &mut DbStats) -> Result<T>) -> Result<T> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let db = state.db.as_mut().ok_or(PngDbError::NotInitialized)?;
        op(db, &mut state.stats)
    }
}

impl Store for FileBackend {
    /// Open the file; a new file gets the signature and an empty root
    fn init(&self) -> Result<()> {
        self.config.validate()?;
        let db = OpenDb::open(&self.config)?;
        self.state.lock().db = Some(db);
        Ok(())
    }

    fn push(&self, entry: &DbEntry) -> Result<EntryId> {
        let max_attempts = self.config.max_id_attempts;
        self.with_db(|db, stats| db.push(entry, stats, max_attempts))
    }

    fn get(&self, id: &EntryId) -> Result<DbEntry> {
        self.with_db(|db, _| db.fetch(id))
    }

    fn stats(&self) -> DbStats {
        self.state.lock().stats
    }

    fn push_to_dir(&self, path: &str, entry: &DirEntry) -> Result<()> {
        self.with_db(|db, _| db.append_list_item(&fs_key(path), &entry.serialize()))
    }

    fn get_dir(&self, path: &str) -> Result<Vec<DirEntry>> {
        let records = self.with_db(|db, _| db.get_list(&fs_key(path)))?;
        Ok(records
            .iter()
            .filter_map(|raw| match DirEntry::deserialize(raw) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(path, error = %e, "skipping unreadable dir record");
                    None
                }
            })
            .collect())
    }

    fn set_file_ref(&self, id: Option<&EntryId>, path: &str) -> Result<()> {
        let value = id.map(EntryId::as_bytes).unwrap_or_default();
        self.with_db(|db, _| db.set(&fs_key(path), value))
    }

    fn get_file_ref(&self, path: &str) -> Result<Option<EntryId>> {
        let raw = self.with_db(|db, _| db.get(&fs_key(path)))?;
        if raw.is_empty() {
            return Ok(None);
        }
        EntryId::from_bytes(raw).map(Some)
    }
}

// =============================================================================
// Open Database
// =============================================================================

impl OpenDb {
    fn open(config: &Config) -> Result<Self> {
        let mut file = ChunkFile::open(&config.db_path, config.read_only)?;

        if file.is_empty() {
            if file.is_read_only() {
                return Err(PngDbError::format("database file is empty"));
            }
            file.write_at(0, &SIGNATURE)?;
            let root = TreeChunk::new(ChunkRef::ROOT);
            root.write(&mut file)?;
            if config.sync_strategy == SyncStrategy::EveryWrite {
                file.sync()?;
            }
            tracing::debug!(path = ?config.db_path, "initialised new database file");
            return Ok(Self {
                file,
                root,
                sync: config.sync_strategy,
            });
        }

        if file.len() < SIGNATURE.len() as u64 {
            return Err(PngDbError::format(
                "database file even too small for the signature",
            ));
        }
        let mut signature = [0u8; SIGNATURE.len()];
        file.read_at(0, &mut signature, "signature")?;
        if signature != SIGNATURE {
            return Err(PngDbError::format("database file signature wrong"));
        }

        let root = TreeChunk::read(&mut file, ChunkRef::ROOT)?;
        tracing::debug!(
            path = ?config.db_path,
            size = file.len(),
            read_only = config.read_only,
            "opened database file"
        );
        Ok(Self {
            file,
            root,
            sync: config.sync_strategy,
        })
    }

    // -------------------------------------------------------------------------
    // Key operations (caller holds the backend mutex)
    // -------------------------------------------------------------------------

    fn get(&mut self, key: &[u8]) -> Result<Vec<u8>> {
        let chunk = self
            .root
            .get_value(&mut self.file, key, Lookup::Existing)?
            .into_chunk();
        chunk.get_data(&mut self.file)
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.mutate(|file, root| match root.get_value(file, key, Lookup::OrCreate(value))? {
            Located::Found(mut chunk) => chunk.overwrite_data(file, value),
            Located::Created(_) => Ok(()),
        })
    }

    fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.mutate(|file, root| {
            root.get_value(file, key, Lookup::CreateNew(value))?;
            Ok(())
        })
    }

    fn append(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.mutate(|file, root| match root.get_value(file, key, Lookup::OrCreate(value))? {
            Located::Found(mut chunk) => chunk.append_data(file, value),
            Located::Created(_) => Ok(()),
        })
    }

    /// Run a write against the trie, then apply the sync strategy
    ///
    /// On failure the cached root is reloaded so it matches whatever reached
    /// the disk.
    fn mutate<T>(
        &mut self,
        op: impl FnOnce(&mut ChunkFile, &mut TreeChunk) -> Result<T>,
    ) -> Result<T> {
        if self.file.is_read_only() {
            return Err(PngDbError::ReadOnly);
        }

        match op(&mut self.file, &mut self.root) {
            Ok(value) => {
                if self.sync == SyncStrategy::EveryWrite {
                    self.file.sync()?;
                }
                Ok(value)
            }
            Err(e @ (PngDbError::AlreadyExists | PngDbError::NotFound)) => Err(e),
            Err(e) => {
                match TreeChunk::read(&mut self.file, ChunkRef::ROOT) {
                    Ok(root) => self.root = root,
                    Err(reload) => tracing::warn!(error = %reload, "root chunk reload failed"),
                }
                tracing::warn!(error = %e, "write failed; reloaded root chunk");
                Err(e)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Entry lists
    // -------------------------------------------------------------------------

    fn append_list_item(&mut self, key: &[u8], item: &[u8]) -> Result<()> {
        let encoded = list::encode_item(item)?;
        self.append(key, &encoded)
    }

    fn get_list(&mut self, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        list::decode_list(&self.get(key)?)
    }

    // -------------------------------------------------------------------------
    // Entries
    // -------------------------------------------------------------------------

    fn fetch(&mut self, id: &EntryId) -> Result<DbEntry> {
        let compressed = self.get(&data_key(id))?;
        DbEntry::from_compressed(compressed)
    }

    fn push(&mut self, entry: &DbEntry, stats: &mut DbStats, max_attempts: usize) -> Result<EntryId> {
        let (digest, compressed) = entry.storage_form()?;
        let ref_key = sha1ref_key(digest);

        if let Some(id) = self.find_duplicate(&ref_key, entry)? {
            stats.push_reuse += 1;
            return Ok(id);
        }

        let id = allocate_id(&mut rand::thread_rng(), max_attempts, |candidate| {
            self.add(&data_key(candidate), compressed)
        })?;
        self.append_list_item(&ref_key, id.as_bytes())?;
        stats.push_new += 1;
        tracing::trace!(id = %id, digest = %digest, len = compressed.len(), "stored new entry");
        Ok(id)
    }

    /// Scan the ids recorded under a digest for an equal entry
    fn find_duplicate(&mut self, ref_key: &[u8], entry: &DbEntry) -> Result<Option<EntryId>> {
        let candidates = match self.get_list(ref_key) {
            Ok(candidates) => candidates,
            Err(PngDbError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };

        for raw in candidates {
            let id = match EntryId::from_bytes(raw) {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed id in dedup list");
                    continue;
                }
            };
            match self.fetch(&id) {
                Ok(existing) if existing == *entry => return Ok(Some(id)),
                Ok(_) => {}
                Err(e) => tracing::warn!(id = %id, error = %e, "skipping unreadable dedup candidate"),
            }
        }
        Ok(None)
    }
}

// =============================================================================
// Key Naming
// =============================================================================

fn data_key(id: &EntryId) -> Vec<u8> {
    [DATA_PREFIX, id.as_bytes()].concat()
}

fn sha1ref_key(digest: &Digest) -> Vec<u8> {
    [SHA1REF_PREFIX, digest.as_bytes().as_slice()].concat()
}

fn fs_key(path: &str) -> Vec<u8> {
    [FS_PREFIX, path.as_bytes()].concat()
}
