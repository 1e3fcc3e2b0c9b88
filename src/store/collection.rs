//! RecordStore implementation
//!
//! HashMap-based record set with RwLock for concurrency.

use parking_lot::RwLock;

use super::Records;
use crate::error::{Result, SnapError};

/// Concurrency-safe in-memory record set
///
/// ## Concurrency:
/// - `records` and `last_persisted` live behind ONE RwLock, so a reader
///   always sees both in a state that existed at a single instant
/// - `create`/`update`/`delete` take the write lock
/// - `read`/`keys`/`all` take the read lock and run in parallel
pub struct RecordStore {
    inner: RwLock<Inner>,
}

struct Inner {
    records: Records,

    /// Fingerprint of the last snapshot written successfully, `None` until
    /// the first flush
    last_persisted: Option<String>,
}

impl RecordStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::from_records(Records::new())
    }

    /// Create a store populated from a decoded snapshot
    pub fn from_records(records: Records) -> Self {
        Self {
            inner: RwLock::new(Inner {
                records,
                last_persisted: None,
            }),
        }
    }

    /// Insert a new record
    ///
    /// Fails with `AlreadyExists` without touching the stored value if the
    /// key is present.
    pub fn create(&self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let key = key.into();
        let mut inner = self.inner.write();

        if inner.records.contains_key(&key) {
            return Err(SnapError::AlreadyExists { key });
        }

        inner.records.insert(key, value.into());
        Ok(())
    }

    /// Get the current value of a record
    pub fn read(&self, key: &str) -> Result<String> {
        self.inner
            .read()
            .records
            .get(key)
            .cloned()
            .ok_or_else(|| SnapError::NotFound {
                key: key.to_string(),
            })
    }

    /// Overwrite the value of an existing record
    pub fn update(&self, key: &str, value: impl Into<String>) -> Result<()> {
        let mut inner = self.inner.write();

        match inner.records.get_mut(key) {
            Some(slot) => {
                *slot = value.into();
                Ok(())
            }
            None => Err(SnapError::NotFound {
                key: key.to_string(),
            }),
        }
    }

    /// Remove an existing record
    pub fn delete(&self, key: &str) -> Result<()> {
        self.inner
            .write()
            .records
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| SnapError::NotFound {
                key: key.to_string(),
            })
    }

    /// All current keys, in no particular order
    pub fn keys(&self) -> Vec<String> {
        self.inner.read().records.keys().cloned().collect()
    }

    /// Detached copy of the full record set
    ///
    /// Later mutations of the store never show up in the returned map, and
    /// mutating the returned map never reaches the store.
    pub fn all(&self) -> Records {
        self.inner.read().records.clone()
    }

    /// Check whether a key is present
    pub fn contains(&self, key: &str) -> bool {
        self.inner.read().records.contains_key(key)
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    /// Check if the store holds no records
    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }

    // =========================================================================
    // Persistence Bookkeeping
    // =========================================================================

    /// Fingerprint of the last successfully written snapshot
    pub fn last_persisted_fingerprint(&self) -> Option<String> {
        self.inner.read().last_persisted.clone()
    }

    /// Record that a snapshot with this fingerprint reached disk
    pub(crate) fn mark_persisted(&self, fingerprint: String) {
        self.inner.write().last_persisted = Some(fingerprint);
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("RecordStore")
            .field("len", &inner.records.len())
            .field("last_persisted", &inner.last_persisted)
            .finish()
    }
}
