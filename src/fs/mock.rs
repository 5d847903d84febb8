// src/fs/mock.rs

use super::{EntryKind, FileStat, FileSystem};
use crate::errors::{FsError, FsErrorKind, FsResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File {
        content: Vec<u8>,
        modified: SystemTime,
        accessed: SystemTime,
    },
    Dir,
}

#[derive(Debug, Default)]
struct State {
    entries: BTreeMap<PathBuf, MockEntry>,
    writes: usize,
    removes: usize,
}

/// In-memory filesystem that counts mutating operations.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<State>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Add a file with a modification time `secs` seconds after the epoch.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>, secs: u64) {
        let path = path.as_ref();
        let at = SystemTime::UNIX_EPOCH + Duration::from_secs(secs);
        let mut state = self.lock();
        ensure_parents(&mut state.entries, path);
        state.entries.insert(
            path.to_path_buf(),
            MockEntry::File {
                content: content.into(),
                modified: at,
                accessed: at,
            },
        );
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut state = self.lock();
        ensure_parents(&mut state.entries, path);
        state.entries.insert(path.to_path_buf(), MockEntry::Dir);
    }

    pub fn remove(&self, path: impl AsRef<Path>) {
        self.lock().entries.remove(path.as_ref());
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.lock().entries.get(path.as_ref()) {
            Some(MockEntry::File { content, .. }) => Some(content.clone()),
            _ => None,
        }
    }

    pub fn modified(&self, path: impl AsRef<Path>) -> Option<SystemTime> {
        match self.lock().entries.get(path.as_ref()) {
            Some(MockEntry::File { modified, .. }) => Some(*modified),
            _ => None,
        }
    }

    /// Number of file copies performed through the trait.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    pub fn remove_count(&self) -> usize {
        self.lock().removes
    }
}

fn ensure_parents(entries: &mut BTreeMap<PathBuf, MockEntry>, path: &Path) {
    let mut cur = path.parent();
    while let Some(dir) = cur {
        if dir.as_os_str().is_empty() {
            break;
        }
        entries.entry(dir.to_path_buf()).or_insert(MockEntry::Dir);
        cur = dir.parent();
    }
}

impl FileSystem for MockFileSystem {
    fn stat(&self, path: &Path) -> FsResult<FileStat> {
        let state = self.lock();
        match state.entries.get(path) {
            Some(MockEntry::File {
                content,
                modified,
                accessed,
            }) => Ok(FileStat {
                kind: EntryKind::File,
                len: content.len() as u64,
                modified: *modified,
                accessed: *accessed,
            }),
            Some(MockEntry::Dir) => Ok(FileStat {
                kind: EntryKind::Dir,
                len: 0,
                modified: SystemTime::UNIX_EPOCH,
                accessed: SystemTime::UNIX_EPOCH,
            }),
            None => Err(FsError::new(FsErrorKind::NotFound, "stat", path)),
        }
    }

    fn copy_with_times(
        &self,
        from: &Path,
        to: &Path,
        accessed: SystemTime,
        modified: SystemTime,
    ) -> FsResult<()> {
        let mut state = self.lock();
        let content = match state.entries.get(from) {
            Some(MockEntry::File { content, .. }) => content.clone(),
            Some(MockEntry::Dir) => return Err(FsError::new(FsErrorKind::Other, "copy", from)),
            None => return Err(FsError::new(FsErrorKind::NotFound, "copy", from)),
        };
        if let Some(parent) = to.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !matches!(state.entries.get(parent), Some(MockEntry::Dir)) {
                return Err(FsError::new(FsErrorKind::NotFound, "copy", to));
            }
        }
        state.entries.insert(
            to.to_path_buf(),
            MockEntry::File {
                content,
                modified,
                accessed,
            },
        );
        state.writes += 1;
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> FsResult<()> {
        let mut state = self.lock();
        match state.entries.get(path) {
            Some(MockEntry::File { .. }) => {
                state.entries.remove(path);
                state.removes += 1;
                Ok(())
            }
            Some(MockEntry::Dir) => Err(FsError::new(FsErrorKind::Other, "remove", path)),
            None => Err(FsError::new(FsErrorKind::NotFound, "remove", path)),
        }
    }

    fn create_dir_all(&self, path: &Path) -> FsResult<()> {
        let mut state = self.lock();
        if let Some(MockEntry::File { .. }) = state.entries.get(path) {
            return Err(FsError::new(FsErrorKind::AlreadyExists, "create dir", path));
        }
        ensure_parents(&mut state.entries, path);
        state.entries.insert(path.to_path_buf(), MockEntry::Dir);
        Ok(())
    }

    fn read_dir(&self, path: &Path) -> FsResult<Vec<PathBuf>> {
        let state = self.lock();
        match state.entries.get(path) {
            Some(MockEntry::Dir) => Ok(state
                .entries
                .keys()
                .filter(|p| p.parent() == Some(path))
                .cloned()
                .collect()),
            Some(MockEntry::File { .. }) => {
                Err(FsError::new(FsErrorKind::NotADirectory, "read dir", path))
            }
            None => Err(FsError::new(FsErrorKind::NotFound, "read dir", path)),
        }
    }
}
