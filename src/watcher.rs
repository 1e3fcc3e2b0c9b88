//! Watcher
//!
//! Background thread that keeps the snapshot file in step with the store.
//!
//! ## Cycle
//! ```text
//!        ┌──────────── wait poll_interval ◄──────────────┐
//!        ▼                                               │
//!   copy = store.all()                                   │
//!   empty? ──yes──► skip ────────────────────────────────┤
//!        │no                                             │
//!   fp = fingerprint(copy)                               │
//!   fp == last persisted? ──yes──► clean ────────────────┤
//!        │no                                             │
//!   flush(copy) ──ok──► last persisted = fp ─────────────┤
//!        └──err──► log, keep old fingerprint (retry) ────┘
//! ```
//!
//! The wait is a `recv_timeout` on a shutdown channel, so `stop()` wakes the
//! thread immediately instead of after a full interval.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::config::Mode;
use crate::error::{Result, SnapError};
use crate::persistence::Persistence;
use crate::snapshot::Fingerprinter;
use crate::store::RecordStore;

/// What one sync step did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Store was empty; nothing written (an empty store never overwrites
    /// an existing snapshot)
    SkippedEmpty,

    /// Fingerprint matched the last snapshot
    Clean,

    /// A new snapshot was written
    Flushed { bytes: usize, fingerprint: String },
}

/// Everything a sync step needs, shared between the watcher thread and
/// the engine's synchronous flush path
#[derive(Clone)]
pub struct SyncContext {
    pub store: Arc<RecordStore>,
    pub persistence: Arc<Persistence>,
    pub fingerprinter: Arc<dyn Fingerprinter>,
    pub path: PathBuf,
    pub mode: Mode,

    /// Serializes sync steps so two flushes never interleave on the file
    sync_lock: Arc<Mutex<()>>,
}

impl SyncContext {
    pub fn new(
        store: Arc<RecordStore>,
        persistence: Arc<Persistence>,
        fingerprinter: Arc<dyn Fingerprinter>,
        path: impl Into<PathBuf>,
        mode: Mode,
    ) -> Self {
        Self {
            store,
            persistence,
            fingerprinter,
            path: path.into(),
            mode,
            sync_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Run one poll: snapshot the store, compare fingerprints, flush on drift
    ///
    /// On error the store's persisted fingerprint is left untouched, so the
    /// next call retries.
    pub fn sync_once(&self) -> Result<SyncOutcome> {
        let _guard = self.sync_lock.lock();

        let records = self.store.all();
        if records.is_empty() {
            return Ok(SyncOutcome::SkippedEmpty);
        }

        let fingerprint = self.fingerprinter.fingerprint(&records);
        if self.store.last_persisted_fingerprint().as_deref() == Some(fingerprint.as_str()) {
            return Ok(SyncOutcome::Clean);
        }

        let bytes = self.persistence.flush(&records, &self.path)?;
        self.store.mark_persisted(fingerprint.clone());

        Ok(SyncOutcome::Flushed { bytes, fingerprint })
    }

    /// `sync_once` plus logging; errors are logged and swallowed
    pub fn sync_and_log(&self) -> Option<SyncOutcome> {
        match self.sync_once() {
            Ok(outcome) => {
                self.log_outcome(&outcome);
                Some(outcome)
            }
            Err(e) => {
                error!(
                    target: "snapkv::watcher",
                    path = %self.path.display(),
                    error = %e,
                    "Failed to persist records, will retry next cycle"
                );
                None
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn log_outcome(&self, outcome: &SyncOutcome) {
        let path = self.path.display();
        match (outcome, self.mode) {
            (SyncOutcome::Flushed { bytes, fingerprint }, Mode::Debug) => {
                info!(target: "snapkv::watcher", %path, bytes, %fingerprint, "Records modified, snapshot saved");
            }
            (SyncOutcome::Flushed { bytes, fingerprint }, Mode::Normal) => {
                debug!(target: "snapkv::watcher", %path, bytes, %fingerprint, "Records modified, snapshot saved");
            }
            (SyncOutcome::Clean, Mode::Debug) => {
                info!(target: "snapkv::watcher", %path, "No changes since last snapshot");
            }
            (SyncOutcome::SkippedEmpty, Mode::Debug) => {
                info!(target: "snapkv::watcher", %path, "Store empty, snapshot left as is");
            }
            _ => {}
        }
    }
}

/// Handle to the running watcher thread
///
/// Stopped (and joined) on `stop()` or on drop.
pub struct Watcher {
    shutdown_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Watcher {
    /// Thread name of the background loop
    pub const THREAD_NAME: &'static str = "snapkv-watcher";

    /// Start polling `ctx` every `interval`
    pub fn spawn(ctx: SyncContext, interval: Duration) -> Result<Self> {
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(1);

        let handle = thread::Builder::new()
            .name(Self::THREAD_NAME.to_string())
            .spawn(move || {
                debug!(
                    target: "snapkv::watcher",
                    path = %ctx.path().display(),
                    interval_ms = interval.as_millis() as u64,
                    "Watcher started"
                );

                loop {
                    match shutdown_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            ctx.sync_and_log();
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }

                debug!(target: "snapkv::watcher", path = %ctx.path().display(), "Watcher stopped");
            })
            .map_err(|e| SnapError::Watcher(format!("failed to spawn watcher thread: {}", e)))?;

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Signal the loop and wait for it to exit
    ///
    /// A sync already in progress runs to completion first. Idempotent.
    pub fn stop(&mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| SnapError::Watcher("watcher thread panicked".to_string())),
            None => Ok(()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("running", &self.is_running())
            .finish()
    }
}
