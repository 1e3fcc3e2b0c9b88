//! Configuration for SnapKV
//!
//! Centralized configuration with sensible defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, SnapError};

/// Main configuration for a SnapKV instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Snapshot Configuration
    // -------------------------------------------------------------------------
    /// Snapshot file backing the store
    pub snapshot_path: PathBuf,

    /// Write `<file>.tmp` then rename over the snapshot instead of
    /// overwriting it in place
    pub atomic_writes: bool,

    /// zstd compression level for snapshot bytes
    pub compression_level: i32,

    // -------------------------------------------------------------------------
    // Watcher Configuration
    // -------------------------------------------------------------------------
    /// Time between two watcher polls
    pub poll_interval: Duration,

    /// Run one last synchronous flush when the engine shuts down
    pub flush_on_shutdown: bool,

    // -------------------------------------------------------------------------
    // Logging
    // -------------------------------------------------------------------------
    pub mode: Mode,
}

/// Logging mode of an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Persistence activity logged at debug level
    #[default]
    Normal,

    /// Persistence activity logged at info level
    Debug,
}

impl Mode {
    pub fn is_debug(self) -> bool {
        self == Mode::Debug
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("./snapkv.db"),
            atomic_writes: true,
            compression_level: 3,
            poll_interval: Duration::from_secs(15),
            flush_on_shutdown: true,
            mode: Mode::Normal,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Default config backed by the given snapshot file
    pub fn with_path(path: impl AsRef<Path>) -> Self {
        Self {
            snapshot_path: path.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.snapshot_path.as_os_str().is_empty() {
            return Err(SnapError::Config("snapshot path is empty".to_string()));
        }
        if self.snapshot_path.file_name().is_none() {
            return Err(SnapError::Config(format!(
                "snapshot path has no file name: {}",
                self.snapshot_path.display()
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(SnapError::Config("poll interval must be non-zero".to_string()));
        }
        if !(1..=22).contains(&self.compression_level) {
            return Err(SnapError::Config(format!(
                "compression level {} outside 1..=22",
                self.compression_level
            )));
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
    /// Set the snapshot file path
    pub fn snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.snapshot_path = path.into();
        self
    }

    /// Set the logging mode
    pub fn mode(mut self, mode: Mode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Shorthand for `mode(Mode::Debug)`
    pub fn debug(self) -> Self {
        self.mode(Mode::Debug)
    }

    /// Set the watcher poll interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Enable or disable write-then-rename snapshot replacement
    pub fn atomic_writes(mut self, enabled: bool) -> Self {
        self.config.atomic_writes = enabled;
        self
    }

    /// Set the zstd compression level
    pub fn compression_level(mut self, level: i32) -> Self {
        self.config.compression_level = level;
        self
    }

    /// Enable or disable the final flush on shutdown
    pub fn flush_on_shutdown(mut self, enabled: bool) -> Self {
        self.config.flush_on_shutdown = enabled;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
