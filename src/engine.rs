//! Engine Module
//!
//! Lifecycle of a store bound to one snapshot file.
//!
//! ## Responsibilities
//! - Allow at most one live engine per snapshot path in this process
//! - Run load-or-create plus watcher spawn exactly once, even under races
//! - Expose the record operations to the hosting application
//! - Stop the watcher and do a final flush on shutdown

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use once_cell::sync::{Lazy, OnceCell};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, SnapError};
use crate::persistence::Persistence;
use crate::snapshot::{Fingerprinter, Xxh3Fingerprinter};
use crate::store::{RecordStore, Records};
use crate::watcher::{SyncContext, SyncOutcome, Watcher};

// =============================================================================
// Global Engine Registry
// =============================================================================
//
// Maps a normalized snapshot path to the slot that initializes it. The slot
// keeps only a weak reference, so dropping every `Engine` handle frees the
// path for a fresh `initialize`.

static OPEN_ENGINES: Lazy<Mutex<HashMap<PathBuf, Arc<InitSlot>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// One-time initialization guard for a single path
///
/// Every caller that finds the slot still empty blocks on the same cell and
/// observes the winner's outcome.
#[derive(Default)]
struct InitSlot {
    cell: OnceCell<std::result::Result<Weak<Shared>, SnapError>>,

    /// Set by the engine's drop once its final flush has finished
    released: AtomicBool,
}

impl InitSlot {
    /// True once initialization failed, or its engine finished shutting down
    ///
    /// An engine whose last handle is gone but whose drop is still flushing
    /// keeps the path bound.
    fn is_stale(&self) -> bool {
        match self.cell.get() {
            Some(Ok(_)) => self.released.load(Ordering::SeqCst),
            Some(Err(_)) => true,
            None => false,
        }
    }
}

/// Handle to an initialized store
///
/// Cheap to clone; all clones share the same store and watcher. The last
/// handle to be dropped shuts the engine down.
#[derive(Clone)]
pub struct Engine {
    shared: Arc<Shared>,
}

struct Shared {
    config: Config,

    /// Registry key (normalized snapshot path)
    registry_key: PathBuf,

    /// Registry slot this engine was created in
    slot: Arc<InitSlot>,

    store: Arc<RecordStore>,

    sync: SyncContext,

    watcher: Mutex<Option<Watcher>>,

    shut_down: AtomicBool,
}

impl Engine {
    /// Initialize the store backed by `config.snapshot_path`
    ///
    /// 1. Reject the call if an engine for this path is alive
    /// 2. Load the snapshot (or start empty if there is none)
    /// 3. Spawn the watcher
    ///
    /// Concurrent callers for the same path share one initialization: they
    /// all get the same handle, or all get the same error.
    pub fn initialize(config: Config) -> Result<Self> {
        let persistence = Persistence::new(&config);
        Self::initialize_with(config, persistence, Arc::new(Xxh3Fingerprinter))
    }

    /// Like `initialize`, with caller-supplied persistence and fingerprinting
    pub fn initialize_with(
        config: Config,
        persistence: Persistence,
        fingerprinter: Arc<dyn Fingerprinter>,
    ) -> Result<Self> {
        config.validate()?;
        let registry_key = normalize_path(&config.snapshot_path)?;
        let persistence = Arc::new(persistence);

        loop {
            let slot = {
                let mut registry = OPEN_ENGINES.lock();
                let slot = registry
                    .entry(registry_key.clone())
                    .or_insert_with(|| Arc::new(InitSlot::default()));

                if slot.is_stale() {
                    *slot = Arc::new(InitSlot::default());
                } else if slot.cell.get().is_some() {
                    return Err(SnapError::AlreadyInitialized { path: registry_key });
                }
                Arc::clone(slot)
            };

            let mut created = None;
            let outcome = slot.cell.get_or_init(|| {
                Self::bootstrap(
                    config.clone(),
                    registry_key.clone(),
                    Arc::clone(&slot),
                    Arc::clone(&persistence),
                    Arc::clone(&fingerprinter),
                )
                .map(|engine| {
                    let weak = Arc::downgrade(&engine.shared);
                    created = Some(engine);
                    weak
                })
            });

            if let Some(engine) = created {
                return Ok(engine);
            }

            match outcome {
                Ok(weak) => match weak.upgrade() {
                    Some(shared) => return Ok(Self { shared }),
                    // The winner was dropped before we could share it; the
                    // next pass waits for its release
                    None => continue,
                },
                Err(e) => return Err(e.clone()),
            }
        }
    }

    /// Load-or-create and watcher spawn; runs once per slot
    fn bootstrap(
        config: Config,
        registry_key: PathBuf,
        slot: Arc<InitSlot>,
        persistence: Arc<Persistence>,
        fingerprinter: Arc<dyn Fingerprinter>,
    ) -> Result<Self> {
        let path = config.snapshot_path.clone();

        // Step 1: Load existing snapshot (empty if none)
        let records = persistence.load(&path)?;
        let loaded = records.len();

        // Step 2: Build the store; a loaded snapshot is already on disk
        let store = Arc::new(Self::restore(records, fingerprinter.as_ref()));

        // Step 3: Start the watcher
        let sync = SyncContext::new(
            Arc::clone(&store),
            persistence,
            fingerprinter,
            path.clone(),
            config.mode,
        );
        let watcher = Watcher::spawn(sync.clone(), config.poll_interval)?;

        let message = "Store initialized";
        if config.mode.is_debug() {
            info!(target: "snapkv::engine", path = %path.display(), records = loaded, "{}", message);
        } else {
            debug!(target: "snapkv::engine", path = %path.display(), records = loaded, "{}", message);
        }

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                registry_key,
                slot,
                store,
                sync,
                watcher: Mutex::new(Some(watcher)),
                shut_down: AtomicBool::new(false),
            }),
        })
    }

    fn restore(records: Records, fingerprinter: &dyn Fingerprinter) -> RecordStore {
        if records.is_empty() {
            return RecordStore::new();
        }
        let fingerprint = fingerprinter.fingerprint(&records);
        let store = RecordStore::from_records(records);
        store.mark_persisted(fingerprint);
        store
    }

    // =========================================================================
    // Record Operations
    // =========================================================================

    /// Insert a new record (`AlreadyExists` if present)
    pub fn create(&self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.shared.store.create(key, value)
    }

    /// Get a record's value (`NotFound` if absent)
    pub fn read(&self, key: &str) -> Result<String> {
        self.shared.store.read(key)
    }

    /// Overwrite an existing record (`NotFound` if absent)
    pub fn update(&self, key: &str, value: impl Into<String>) -> Result<()> {
        self.shared.store.update(key, value)
    }

    /// Remove an existing record (`NotFound` if absent)
    pub fn delete(&self, key: &str) -> Result<()> {
        self.shared.store.delete(key)
    }

    /// All current keys, unordered
    pub fn keys(&self) -> Vec<String> {
        self.shared.store.keys()
    }

    /// Detached copy of every record
    pub fn all(&self) -> Records {
        self.shared.store.all()
    }

    pub fn len(&self) -> usize {
        self.shared.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.store.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.shared.store.contains(key)
    }

    // =========================================================================
    // Persistence Control
    // =========================================================================

    /// Run one watcher cycle now, on the calling thread
    pub fn flush_now(&self) -> Result<SyncOutcome> {
        self.shared.sync.sync_once()
    }

    /// Stop the watcher and, if configured, flush one last time
    ///
    /// Idempotent: only the first call does any work. Record operations keep
    /// working afterwards but are no longer persisted.
    pub fn shutdown(&self) -> Result<()> {
        self.shared.shutdown()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The shared record store
    pub fn store(&self) -> &Arc<RecordStore> {
        &self.shared.store
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.shared.config.snapshot_path
    }

    /// Whether the background watcher is still polling
    pub fn is_watching(&self) -> bool {
        self.shared
            .watcher
            .lock()
            .as_ref()
            .map_or(false, |w| w.is_running())
    }

    /// Whether two handles refer to the same engine
    pub fn ptr_eq(&self, other: &Engine) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("snapshot_path", &self.shared.config.snapshot_path)
            .field("records", &self.shared.store.len())
            .field("shut_down", &self.shared.shut_down.load(Ordering::SeqCst))
            .finish()
    }
}

impl Shared {
    fn shutdown(&self) -> Result<()> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // Step 1: Stop the background loop
        if let Some(mut watcher) = self.watcher.lock().take() {
            watcher.stop()?;
        }

        // Step 2: Final flush
        if self.config.flush_on_shutdown {
            let outcome = self.sync.sync_once()?;
            info!(
                target: "snapkv::engine",
                path = %self.config.snapshot_path.display(),
                ?outcome,
                "Engine shut down"
            );
        }

        Ok(())
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(
                target: "snapkv::engine",
                path = %self.config.snapshot_path.display(),
                error = %e,
                "Shutdown on drop failed"
            );
        }

        // Only now, after the final flush, may another engine load the file
        let mut registry = OPEN_ENGINES.lock();
        self.slot.released.store(true, Ordering::SeqCst);
        if registry
            .get(&self.registry_key)
            .map_or(false, |slot| Arc::ptr_eq(slot, &self.slot))
        {
            registry.remove(&self.registry_key);
        }
    }
}

/// Registry key for a snapshot path
///
/// The file may not exist yet, so only the parent directory is
/// canonicalized; a parent that does not exist either falls back to the
/// absolute path.
fn normalize_path(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let canonical = match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|dir| dir.join(name))
            .unwrap_or(absolute),
        _ => absolute,
    };
    Ok(canonical)
}

/// Initialize the store backed by `config.snapshot_path`
///
/// See [`Engine::initialize`].
pub fn initialize(config: Config) -> Result<Engine> {
    Engine::initialize(config)
}
