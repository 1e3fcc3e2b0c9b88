//! Persistence Engine
//!
//! Loads a record set from a snapshot file and writes one back.
//!
//! ## Responsibilities
//! - `load`: read → decompress → decode (missing file = empty set)
//! - `flush`: encode → compress → write
//!
//! Each stage reports its own error kind; a failed flush leaves the
//! previous snapshot (and the store's fingerprint bookkeeping) alone.

use std::path::Path;
use std::sync::Arc;

use tracing::trace;

use crate::config::Config;
use crate::error::Result;
use crate::file_storage::{FileStorage, LocalFileStorage};
use crate::snapshot::{BincodeCodec, Codec, Compressor, ZstdCompressor};
use crate::store::Records;

/// Snapshot reader/writer over pluggable storage, codec and compressor
pub struct Persistence {
    storage: Arc<dyn FileStorage>,
    codec: Box<dyn Codec>,
    compressor: Box<dyn Compressor>,
}

impl Persistence {
    /// Default stack for a config: local files, bincode, zstd
    pub fn new(config: &Config) -> Self {
        Self::with_parts(
            Arc::new(LocalFileStorage::new(config.atomic_writes)),
            Box::new(BincodeCodec),
            Box::new(ZstdCompressor::new(config.compression_level)),
        )
    }

    /// Build from explicit capabilities
    pub fn with_parts(
        storage: Arc<dyn FileStorage>,
        codec: Box<dyn Codec>,
        compressor: Box<dyn Compressor>,
    ) -> Self {
        Self {
            storage,
            codec,
            compressor,
        }
    }

    /// Load the record set stored at `path`
    ///
    /// Returns an empty set if no file exists; "no snapshot yet" is not an
    /// error.
    pub fn load(&self, path: &Path) -> Result<Records> {
        if !self.storage.exists(path) {
            trace!(target: "snapkv::persistence", path = %path.display(), "No snapshot file");
            return Ok(Records::new());
        }

        let compressed = self.storage.read(path)?;
        let encoded = self.compressor.decompress(&compressed)?;
        let records = self.codec.decode(&encoded)?;

        trace!(
            target: "snapkv::persistence",
            path = %path.display(),
            bytes = compressed.len(),
            records = records.len(),
            "Snapshot loaded"
        );
        Ok(records)
    }

    /// Write `records` to `path`, returning the number of bytes written
    pub fn flush(&self, records: &Records, path: &Path) -> Result<usize> {
        let encoded = self.codec.encode(records)?;
        let compressed = self.compressor.compress(&encoded)?;
        self.storage.write(path, &compressed)?;

        trace!(
            target: "snapkv::persistence",
            path = %path.display(),
            codec = self.codec.name(),
            compressor = self.compressor.name(),
            raw_bytes = encoded.len(),
            bytes = compressed.len(),
            "Snapshot written"
        );
        Ok(compressed.len())
    }

    /// Underlying file storage
    pub fn storage(&self) -> &Arc<dyn FileStorage> {
        &self.storage
    }
}

impl std::fmt::Debug for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistence")
            .field("codec", &self.codec.name())
            .field("compressor", &self.compressor.name())
            .finish()
    }
}
