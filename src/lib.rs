//! # pngdb
//!
//! A content-addressable object store kept in a single file:
//! - Paged trie of fixed-size tree chunks mapping byte keys to values
//! - Values stored as CRC-protected chains of value chunks
//! - Entries deduplicated by SHA-1 and stored zlib-compressed
//! - Short random entry ids, grown only on collision
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Store (trait)                           │
//! │        push / get / push_to_dir / get_dir / file refs       │
//! └───────────────┬─────────────────────────────┬───────────────┘
//!                 │                             │
//!                 ▼                             ▼
//!   ┌───────────────────────────┐    ┌─────────────────────┐
//!   │       FileBackend         │    │      FsBackend      │
//!   │ (Mutex, data./sha1ref./fs)│    │ (one file per entry)│
//!   └─────────────┬─────────────┘    └─────────────────────┘
//!                 │
//!                 ▼
//!   ┌───────────────────────────┐
//!   │   Tree chunks (trie)      │──────► Value chunk chains
//!   └───────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use pngdb::{Config, DbEntry, FileBackend, Store};
//!
//! let db = FileBackend::open(Config::builder().db_path("images.pngdb").build())?;
//! let id = db.push(&DbEntry::new(b"hello".to_vec())?)?;
//! assert_eq!(db.get(&id)?.raw(), b"hello");
//! # Ok::<(), pngdb::PngDbError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod codec;
pub mod compress;
pub mod chunk;
pub mod entry;
pub mod backend;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{DecodeError, PngDbError, Result};
pub use config::{Config, SyncStrategy};
pub use entry::{DbEntry, DirEntry, EntryId};
pub use backend::{DbStats, FileBackend, FsBackend, Store};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of pngdb
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
