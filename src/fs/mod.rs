// src/fs/mod.rs

//! Filesystem abstraction.
//!
//! Everything the directory mirror does goes through [`FileSystem`] so the
//! reconciliation logic can run against [`mock::MockFileSystem`] in tests.
//! Errors come back as [`FsError`] with a typed kind.

use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::errors::{FsError, FsErrorKind, FsResult};

pub mod mirror;
pub mod mock;

pub use mirror::{
    copy_if_different, reconcile_tree, reconcile_tree_until, remove_if_present, sync_path,
    ReconcileStats, SyncAction,
};

/// What kind of entry a path refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Other,
}

/// The subset of metadata the mirror compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub kind: EntryKind,
    pub len: u64,
    pub modified: SystemTime,
    pub accessed: SystemTime,
}

impl FileStat {
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// Abstract filesystem interface.
pub trait FileSystem: Send + Sync + Debug {
    /// Metadata for `path`, not following a final symlink.
    fn stat(&self, path: &Path) -> FsResult<FileStat>;

    /// Copy `from` to `to`, then stamp `to` with the given access and
    /// modification times.
    fn copy_with_times(
        &self,
        from: &Path,
        to: &Path,
        accessed: SystemTime,
        modified: SystemTime,
    ) -> FsResult<()>;

    fn remove_file(&self, path: &Path) -> FsResult<()>;

    fn create_dir_all(&self, path: &Path) -> FsResult<()>;

    /// Return a list of entries in a directory.
    /// Returns full paths.
    fn read_dir(&self, path: &Path) -> FsResult<Vec<PathBuf>>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn stat(&self, path: &Path) -> FsResult<FileStat> {
        let meta = fs::symlink_metadata(path).map_err(|e| FsError::from_io("stat", path, e))?;
        let kind = if meta.is_file() {
            EntryKind::File
        } else if meta.is_dir() {
            EntryKind::Dir
        } else {
            EntryKind::Other
        };
        let modified = meta
            .modified()
            .map_err(|e| FsError::from_io("stat", path, e))?;
        let accessed = meta.accessed().unwrap_or(modified);
        Ok(FileStat {
            kind,
            len: meta.len(),
            modified,
            accessed,
        })
    }

    fn copy_with_times(
        &self,
        from: &Path,
        to: &Path,
        accessed: SystemTime,
        modified: SystemTime,
    ) -> FsResult<()> {
        fs::copy(from, to).map_err(|e| FsError::from_io("copy", from, e))?;
        let file = fs::OpenOptions::new()
            .write(true)
            .open(to)
            .map_err(|e| FsError::from_io("open", to, e))?;
        let times = fs::FileTimes::new()
            .set_accessed(accessed)
            .set_modified(modified);
        file.set_times(times)
            .map_err(|e| FsError::from_io("set times on", to, e))?;
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> FsResult<()> {
        fs::remove_file(path).map_err(|e| FsError::from_io("remove", path, e))
    }

    fn create_dir_all(&self, path: &Path) -> FsResult<()> {
        match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => return Ok(()),
            Ok(_) => return Err(FsError::new(FsErrorKind::AlreadyExists, "create dir", path)),
            Err(_) => {}
        }
        fs::create_dir_all(path).map_err(|e| FsError::from_io("create dir", path, e))
    }

    fn read_dir(&self, path: &Path) -> FsResult<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).map_err(|e| FsError::from_io("read dir", path, e))? {
            let entry = entry.map_err(|e| FsError::from_io("read dir", path, e))?;
            entries.push(entry.path());
        }
        Ok(entries)
    }
}
