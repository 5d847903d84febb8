use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use devwatch::errors::FsResult;
use devwatch::fs::{FileStat, FileSystem, RealFileSystem};

#[derive(Debug, Default)]
struct Counts {
    copies: HashMap<PathBuf, usize>,
    active: HashMap<PathBuf, usize>,
    max_active: HashMap<PathBuf, usize>,
}

/// A real filesystem that counts copies per destination and can slow them
/// down, so tests can observe overlap and coalescing.
#[derive(Debug, Default)]
pub struct RecordingFs {
    inner: RealFileSystem,
    copy_delay: Duration,
    counts: Mutex<Counts>,
}

impl RecordingFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every `copy_with_times` before copying.
    pub fn with_copy_delay(mut self, delay: Duration) -> Self {
        self.copy_delay = delay;
        self
    }

    /// Completed copies into `dst`.
    pub fn copies_to(&self, dst: impl AsRef<Path>) -> usize {
        let counts = self.counts.lock().unwrap();
        counts.copies.get(dst.as_ref()).copied().unwrap_or(0)
    }

    /// Completed copies across all destinations.
    pub fn total_copies(&self) -> usize {
        self.counts.lock().unwrap().copies.values().sum()
    }

    /// Highest number of copies into `dst` that were running at once.
    pub fn max_concurrent_copies(&self, dst: impl AsRef<Path>) -> usize {
        let counts = self.counts.lock().unwrap();
        counts.max_active.get(dst.as_ref()).copied().unwrap_or(0)
    }
}

impl FileSystem for RecordingFs {
    fn stat(&self, path: &Path) -> FsResult<FileStat> {
        self.inner.stat(path)
    }

    fn copy_with_times(
        &self,
        from: &Path,
        to: &Path,
        accessed: SystemTime,
        modified: SystemTime,
    ) -> FsResult<()> {
        {
            let mut counts = self.counts.lock().unwrap();
            let active = counts.active.entry(to.to_path_buf()).or_default();
            *active += 1;
            let now = *active;
            let max = counts.max_active.entry(to.to_path_buf()).or_default();
            *max = (*max).max(now);
        }
        if !self.copy_delay.is_zero() {
            std::thread::sleep(self.copy_delay);
        }
        let res = self.inner.copy_with_times(from, to, accessed, modified);

        let mut counts = self.counts.lock().unwrap();
        if let Some(active) = counts.active.get_mut(to) {
            *active -= 1;
        }
        if res.is_ok() {
            *counts.copies.entry(to.to_path_buf()).or_default() += 1;
        }
        res
    }

    fn remove_file(&self, path: &Path) -> FsResult<()> {
        self.inner.remove_file(path)
    }

    fn create_dir_all(&self, path: &Path) -> FsResult<()> {
        self.inner.create_dir_all(path)
    }

    fn read_dir(&self, path: &Path) -> FsResult<Vec<PathBuf>> {
        self.inner.read_dir(path)
    }
}
