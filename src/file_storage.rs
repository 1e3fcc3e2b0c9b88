//! File Storage
//!
//! Existence check, read and write of a single named file.
//!
//! ## Write Modes
//! - **Atomic** (default): write `<name>.tmp` next to the target, fsync it,
//!   rename it over the target, fsync the parent directory. A crash leaves
//!   either the old snapshot or the new one, never a torn file.
//! - **In place**: truncate and overwrite the target. A crash mid-write can
//!   leave a corrupt snapshot.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// File primitives the persistence layer is built on
pub trait FileStorage: Send + Sync {
    /// False only when nothing is at `path`
    ///
    /// A directory, or an entry that cannot be inspected, counts as present
    /// so that `read` reports the actual failure.
    fn exists(&self, path: &Path) -> bool;

    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Replace the whole content of `path` with `data`
    fn write(&self, path: &Path, data: &[u8]) -> Result<()>;
}

/// Local filesystem storage
#[derive(Debug, Clone, Copy)]
pub struct LocalFileStorage {
    atomic: bool,
}

impl LocalFileStorage {
    pub fn new(atomic: bool) -> Self {
        Self { atomic }
    }

    /// Storage using write-then-rename replacement
    pub fn atomic() -> Self {
        Self::new(true)
    }

    /// Storage overwriting files in place
    pub fn in_place() -> Self {
        Self::new(false)
    }

    pub fn is_atomic(&self) -> bool {
        self.atomic
    }

    /// Temporary sibling used by atomic writes: `snap.db` → `snap.db.tmp`
    pub fn temp_path(path: &Path) -> PathBuf {
        let mut name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| OsString::from("snapshot"));
        name.push(".tmp");
        path.with_file_name(name)
    }

    fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<()> {
        let temp_path = Self::temp_path(path);

        // Step 1: Write the temporary file
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)?;

        // Steps 2-3: fill and fsync it, then rename over the target. The
        // temporary file must not outlive a failure in any of them.
        if let Err(e) = fill_and_rename(file, data, &temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        // Step 4: fsync parent directory (not supported everywhere)
        #[cfg(unix)]
        if let Some(dir) = parent_dir(path) {
            File::open(dir)?.sync_all()?;
        }

        Ok(())
    }

    fn write_in_place(&self, path: &Path, data: &[u8]) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(data)?;
        file.sync_all()?;
        Ok(())
    }
}

impl Default for LocalFileStorage {
    fn default() -> Self {
        Self::atomic()
    }
}

impl FileStorage for LocalFileStorage {
    fn exists(&self, path: &Path) -> bool {
        match fs::symlink_metadata(path) {
            Ok(_) => true,
            Err(e) => e.kind() != io::ErrorKind::NotFound,
        }
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(fs::read(path)?)
    }

    fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        if let Some(dir) = parent_dir(path) {
            fs::create_dir_all(dir)?;
        }

        if self.atomic {
            self.write_atomic(path, data)
        } else {
            self.write_in_place(path, data)
        }
    }
}

fn fill_and_rename(mut file: File, data: &[u8], from: &Path, to: &Path) -> io::Result<()> {
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);
    fs::rename(from, to)
}

/// Parent directory of `path`, `None` for bare file names
fn parent_dir(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}
