//! Tests for Engine
//!
//! These tests verify:
//! - Load-or-create on initialize
//! - One live engine per snapshot path
//! - Racing initializers share one outcome
//! - Shutdown stops the watcher and performs the final flush
//! - Engine lifecycle (initialize/drop/re-initialize)

use std::path::{Path, PathBuf};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use snapkv::file_storage::{FileStorage, LocalFileStorage};
use snapkv::persistence::Persistence;
use snapkv::snapshot::{BincodeCodec, Xxh3Fingerprinter, ZstdCompressor};
use snapkv::{Config, Engine, Mode, Records, Result, SnapError, SyncOutcome};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_config() -> (TempDir, Config) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .snapshot_path(temp_dir.path().join("engine.db"))
        .poll_interval(Duration::from_secs(3600)) // Only explicit flushes
        .build();
    (temp_dir, config)
}

fn load(path: &Path) -> Records {
    Persistence::new(&Config::default()).load(path).unwrap()
}

fn write_snapshot(path: &Path, pairs: &[(&str, &str)]) {
    let records: Records = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Persistence::new(&Config::default()).flush(&records, path).unwrap();
}

const WRITE_DELAY: Duration = Duration::from_millis(400);

/// Local storage whose writes take `WRITE_DELAY` before touching the disk
struct SlowStorage(LocalFileStorage);

impl FileStorage for SlowStorage {
    fn exists(&self, path: &Path) -> bool {
        self.0.exists(path)
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.0.read(path)
    }

    fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        thread::sleep(WRITE_DELAY);
        self.0.write(path, data)
    }
}

fn slow_persistence() -> Persistence {
    Persistence::with_parts(
        Arc::new(SlowStorage(LocalFileStorage::atomic())),
        Box::new(BincodeCodec),
        Box::new(ZstdCompressor::default()),
    )
}

// =============================================================================
// Initialization Tests
// =============================================================================

#[test]
fn test_initialize_without_file_is_empty() {
    let (_temp, config) = setup_temp_config();
    let path = config.snapshot_path.clone();

    let engine = Engine::initialize(config).unwrap();

    assert!(engine.is_empty());
    assert!(engine.is_watching());
    assert!(!path.exists());
}

#[test]
fn test_initialize_loads_existing_snapshot() {
    let (_temp, config) = setup_temp_config();
    write_snapshot(&config.snapshot_path, &[("a", "1"), ("b", "2")]);

    let engine = Engine::initialize(config).unwrap();

    assert_eq!(engine.len(), 2);
    assert_eq!(engine.read("a").unwrap(), "1");
    assert_eq!(engine.read("b").unwrap(), "2");
}

#[test]
fn test_loaded_snapshot_is_not_rewritten() {
    let (_temp, config) = setup_temp_config();
    write_snapshot(&config.snapshot_path, &[("a", "1")]);

    let engine = Engine::initialize(config).unwrap();

    assert_eq!(engine.flush_now().unwrap(), SyncOutcome::Clean);
}

#[test]
fn test_initialize_corrupt_snapshot_fails() {
    let (_temp, config) = setup_temp_config();
    std::fs::write(&config.snapshot_path, b"corrupted").unwrap();

    let err = Engine::initialize(config).unwrap_err();

    assert!(matches!(err, SnapError::Decompress(_)));
}

#[test]
fn test_initialize_with_directory_at_snapshot_path_fails() {
    let (_temp, config) = setup_temp_config();
    std::fs::create_dir(&config.snapshot_path).unwrap();

    let err = Engine::initialize(config).unwrap_err();

    assert!(matches!(err, SnapError::Io(_)), "{}", err);
}

#[test]
fn test_initialize_rejects_invalid_config() {
    let (_temp, mut config) = setup_temp_config();
    config.poll_interval = Duration::ZERO;

    assert!(matches!(Engine::initialize(config), Err(SnapError::Config(_))));
}

#[test]
fn test_free_function_initialize() {
    let (_temp, config) = setup_temp_config();

    let engine = snapkv::initialize(config).unwrap();
    engine.create("k", "v").unwrap();

    assert_eq!(engine.read("k").unwrap(), "v");
}

#[test]
fn test_debug_mode_behaves_like_normal() {
    let (_temp, config) = setup_temp_config();
    let config = Config {
        mode: Mode::Debug,
        ..config
    };

    let engine = Engine::initialize(config).unwrap();
    engine.create("a", "1").unwrap();

    assert!(engine.config().mode.is_debug());
    assert!(matches!(engine.flush_now().unwrap(), SyncOutcome::Flushed { .. }));
    assert_eq!(load(engine.snapshot_path()).len(), 1);
}

// =============================================================================
// Single Instance Tests
// =============================================================================

#[test]
fn test_second_initialize_is_already_initialized() {
    let (_temp, config) = setup_temp_config();

    let _engine = Engine::initialize(config.clone()).unwrap();
    let err = Engine::initialize(config).unwrap_err();

    assert!(matches!(err, SnapError::AlreadyInitialized { .. }));
}

#[test]
fn test_equivalent_paths_share_the_guard() {
    let (temp, config) = setup_temp_config();
    let dotted = Config {
        snapshot_path: temp.path().join(".").join("engine.db"),
        ..config.clone()
    };

    let _engine = Engine::initialize(config).unwrap();

    assert!(matches!(
        Engine::initialize(dotted),
        Err(SnapError::AlreadyInitialized { .. })
    ));
}

#[test]
fn test_clones_keep_path_bound() {
    let (_temp, config) = setup_temp_config();

    let engine = Engine::initialize(config.clone()).unwrap();
    let clone = engine.clone();
    drop(engine);

    assert!(Engine::initialize(config).is_err());
    assert!(clone.is_watching());
}

#[test]
fn test_distinct_paths_are_independent() {
    let temp = TempDir::new().unwrap();
    let first = Engine::initialize(Config::with_path(temp.path().join("one.db"))).unwrap();
    let second = Engine::initialize(Config::with_path(temp.path().join("two.db"))).unwrap();

    first.create("k", "1").unwrap();

    assert!(!first.ptr_eq(&second));
    assert!(second.read("k").is_err());
}

#[test]
fn test_reinitialize_after_drop_sees_flushed_data() {
    let (_temp, config) = setup_temp_config();

    let engine = Engine::initialize(config.clone()).unwrap();
    engine.create("persisted", "yes").unwrap();
    drop(engine); // final flush

    let engine = Engine::initialize(config).unwrap();
    assert_eq!(engine.read("persisted").unwrap(), "yes");
}

#[test]
fn test_path_stays_bound_during_final_flush_on_drop() {
    let (_temp, config) = setup_temp_config();
    let path = config.snapshot_path.clone();

    let engine =
        Engine::initialize_with(config.clone(), slow_persistence(), Arc::new(Xxh3Fingerprinter))
            .unwrap();
    engine.create("a", "1").unwrap();

    // The last handle goes away on another thread; its final flush is slow
    let dropper = thread::spawn(move || drop(engine));
    thread::sleep(WRITE_DELAY / 4);

    let deadline = Instant::now() + Duration::from_secs(10);
    let reopened = loop {
        match Engine::initialize(config.clone()) {
            Ok(engine) => break engine,
            Err(SnapError::AlreadyInitialized { .. }) if Instant::now() < deadline => {
                thread::sleep(Duration::from_millis(10));
            }
            Err(e) => panic!("re-initialize failed: {}", e),
        }
    };
    dropper.join().unwrap();

    // The new engine must start from the dropped engine's final snapshot
    assert_eq!(reopened.read("a").unwrap(), "1");

    reopened.create("b", "2").unwrap();
    reopened.shutdown().unwrap();

    let on_disk = load(&path);
    assert_eq!(on_disk.get("a").map(String::as_str), Some("1"));
    assert_eq!(on_disk.get("b").map(String::as_str), Some("2"));
}

#[test]
fn test_initialize_during_final_flush_is_already_initialized() {
    let (_temp, config) = setup_temp_config();

    let engine =
        Engine::initialize_with(config.clone(), slow_persistence(), Arc::new(Xxh3Fingerprinter))
            .unwrap();
    engine.create("a", "1").unwrap();

    let dropper = thread::spawn(move || drop(engine));
    thread::sleep(WRITE_DELAY / 4);

    let err = Engine::initialize(config.clone()).unwrap_err();
    assert!(matches!(err, SnapError::AlreadyInitialized { .. }), "{}", err);

    dropper.join().unwrap();
    assert_eq!(Engine::initialize(config).unwrap().read("a").unwrap(), "1");
}

#[test]
fn test_failed_initialize_can_be_retried() {
    let (_temp, config) = setup_temp_config();
    std::fs::write(&config.snapshot_path, b"corrupted").unwrap();
    assert!(Engine::initialize(config.clone()).is_err());

    std::fs::remove_file(&config.snapshot_path).unwrap();

    assert!(Engine::initialize(config).is_ok());
}

// =============================================================================
// Racing Initialization Tests
// =============================================================================

#[test]
fn test_racing_initializers_share_one_engine() {
    let (_temp, config) = setup_temp_config();
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let config = config.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                Engine::initialize(config)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let engines: Vec<&Engine> = results.iter().filter_map(|r| r.as_ref().ok()).collect();

    assert!(!engines.is_empty());
    for engine in &engines {
        assert!(engine.ptr_eq(engines[0]));
    }
    for result in &results {
        if let Err(e) = result {
            assert!(matches!(e, SnapError::AlreadyInitialized { .. }), "{}", e);
        }
    }
}

#[test]
fn test_racing_initializers_share_one_error() {
    let (_temp, config) = setup_temp_config();
    std::fs::write(&config.snapshot_path, b"corrupted").unwrap();
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let config = config.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                Engine::initialize(config)
            })
        })
        .collect();

    for handle in handles {
        let err = handle.join().unwrap().unwrap_err();
        assert!(matches!(err, SnapError::Decompress(_)), "{}", err);
    }
}

#[test]
fn test_custom_persistence_injection() {
    let (_temp, config) = setup_temp_config();
    let persistence = Persistence::with_parts(
        Arc::new(snapkv::file_storage::LocalFileStorage::in_place()),
        Box::new(snapkv::snapshot::BincodeCodec),
        Box::new(snapkv::snapshot::NoCompression),
    );

    let engine =
        Engine::initialize_with(config, persistence, Arc::new(Xxh3Fingerprinter)).unwrap();
    engine.create("plain", "bytes").unwrap();
    engine.flush_now().unwrap();

    let raw = std::fs::read(engine.snapshot_path()).unwrap();
    let decoded: Records = bincode::deserialize(&raw).unwrap();
    assert_eq!(decoded.get("plain").map(String::as_str), Some("bytes"));
}

// =============================================================================
// Shutdown Tests
// =============================================================================

#[test]
fn test_shutdown_flushes_and_stops_watcher() {
    let (_temp, config) = setup_temp_config();
    let path: PathBuf = config.snapshot_path.clone();

    let engine = Engine::initialize(config).unwrap();
    engine.create("a", "1").unwrap();
    engine.shutdown().unwrap();

    assert!(!engine.is_watching());
    assert_eq!(load(&path).get("a").map(String::as_str), Some("1"));
}

#[test]
fn test_shutdown_is_idempotent() {
    let (_temp, config) = setup_temp_config();
    let engine = Engine::initialize(config).unwrap();
    engine.create("a", "1").unwrap();

    engine.shutdown().unwrap();
    engine.shutdown().unwrap();
}

#[test]
fn test_shutdown_without_final_flush() {
    let (_temp, config) = setup_temp_config();
    let path = config.snapshot_path.clone();
    let config = Config {
        flush_on_shutdown: false,
        ..config
    };

    let engine = Engine::initialize(config).unwrap();
    engine.create("lost", "on exit").unwrap();
    engine.shutdown().unwrap();

    assert!(!path.exists());
}

#[test]
fn test_shutdown_keeps_path_bound_until_drop() {
    let (_temp, config) = setup_temp_config();

    let engine = Engine::initialize(config.clone()).unwrap();
    engine.shutdown().unwrap();
    assert!(Engine::initialize(config.clone()).is_err());

    drop(engine);
    assert!(Engine::initialize(config).is_ok());
}

#[test]
fn test_operations_after_shutdown_stay_in_memory() {
    let (_temp, config) = setup_temp_config();
    let path = config.snapshot_path.clone();

    let engine = Engine::initialize(config).unwrap();
    engine.create("a", "1").unwrap();
    engine.shutdown().unwrap();
    engine.create("b", "2").unwrap();
    drop(engine);

    let on_disk = load(&path);
    assert_eq!(on_disk.len(), 1);
    assert!(on_disk.contains_key("a"));
}
