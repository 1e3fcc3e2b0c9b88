//! # SnapKV
//!
//! An embedded string key-value store with:
//! - Concurrent in-memory records (many readers or one writer)
//! - One live store per snapshot file in a process
//! - Background watcher that flushes a compressed snapshot when the
//!   content fingerprint drifts from the last one written
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Hosting Application                       │
//! └──────────────┬──────────────────────────────┬───────────────┘
//!                │ initialize (once)            │ create/read/...
//! ┌──────────────▼──────────────┐        ┌──────▼──────────────┐
//! │           Engine            │───────►│    RecordStore      │
//! │  (registry + lifecycle)     │        │     (RwLock)        │
//! └──────────────┬──────────────┘        └──────▲──────────────┘
//!                │ spawns                       │ all() every poll
//!         ┌──────▼──────┐                       │
//!         │   Watcher   │───────────────────────┘
//!         │  (thread)   │
//!         └──────┬──────┘
//!                │ fingerprint drifted
//!         ┌──────▼──────┐     ┌─────────────┐
//!         │ Persistence │────►│ FileStorage │
//!         │ codec+zstd  │     │ (snapshot)  │
//!         └─────────────┘     └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use snapkv::Config;
//!
//! let engine = snapkv::initialize(Config::with_path("app.db"))?;
//! engine.create("greeting", "hello")?;
//! assert_eq!(engine.read("greeting")?, "hello");
//! engine.shutdown()?;
//! # Ok::<(), snapkv::SnapError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod store;
pub mod snapshot;
pub mod file_storage;
pub mod persistence;
pub mod watcher;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{SnapError, Result};
pub use config::{Config, Mode};
pub use engine::{initialize, Engine};
pub use store::{RecordStore, Records};
pub use watcher::SyncOutcome;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of SnapKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
