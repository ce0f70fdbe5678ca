//! Configuration for pngdb
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{PngDbError, Result};

/// Main configuration for a pngdb store
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Location of the store.
    ///   - `FileBackend`: the single database file
    ///   - `FsBackend`:   the root directory holding `data/` and `sha1refs/`
    pub db_path: PathBuf,

    /// Open without write access; every mutation fails with `ReadOnly`
    pub read_only: bool,

    /// How often to fsync the database file
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Entry Configuration
    // -------------------------------------------------------------------------
    /// zlib level (0..=9) used when preparing entries for push
    pub compression_level: u32,

    /// Upper bound on id candidates tried before giving up
    pub max_id_attempts: usize,
}

/// Database file sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// Leave flushing to the OS
    Never,

    /// fsync after every mutating key operation (safest, slowest)
    EveryWrite,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("db.pngdb"),
            read_only: false,
            sync_strategy: SyncStrategy::Never,
            compression_level: 9,
            max_id_attempts: 4096,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check that every value is within its supported range
    pub fn validate(&self) -> Result<()> {
        if self.compression_level > 9 {
            return Err(PngDbError::Config(format!(
                "compression level {} out of range 0..=9",
                self.compression_level
            )));
        }
        if self.max_id_attempts == 0 {
            return Err(PngDbError::Config(
                "max_id_attempts must be at least 1".to_string(),
            ));
        }
        if self.db_path.as_os_str().is_empty() {
            return Err(PngDbError::Config("db_path is empty".to_string()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the database location
    pub fn db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.db_path = path.into();
        self
    }

    /// Open the store read-only
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.config.read_only = read_only;
        self
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the zlib compression level
    pub fn compression_level(mut self, level: u32) -> Self {
        self.config.compression_level = level;
        self
    }

    /// Set the id allocation attempt cap
    pub fn max_id_attempts(mut self, attempts: usize) -> Self {
        self.config.max_id_attempts = attempts;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
