// src/fs/mirror.rs

//! Copy-if-different mirroring between a source tree and an output tree.
//!
//! Two files are considered identical when their sizes and modification
//! times match. Contents are never compared byte for byte. Copies carry the
//! source's access/modification times over so the next comparison is stable.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::{EntryKind, FileSystem};
use crate::errors::{FsError, FsErrorKind, FsResult};
use crate::watch::patterns::GlobSpec;

/// What happened to a single output path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Copied,
    Unchanged,
    Removed,
    AlreadyAbsent,
}

/// Counters from one full reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub matched: usize,
    pub copied: usize,
}

/// Copy `src` to `dst` unless `dst` already has the same size and mtime.
///
/// Returns `Ok(true)` if a copy was made. A missing `src` comes back as an
/// [`FsErrorKind::NotFound`] error; a missing `dst` (or its parent
/// directories) is created.
pub fn copy_if_different(fs: &dyn FileSystem, src: &Path, dst: &Path) -> FsResult<bool> {
    let src_stat = fs.stat(src)?;
    if !src_stat.is_file() {
        return Err(FsError::new(FsErrorKind::NotFound, "copy (not a file)", src));
    }

    let up_to_date = match fs.stat(dst) {
        Ok(dst_stat) => {
            dst_stat.is_file()
                && dst_stat.len == src_stat.len
                && dst_stat.modified == src_stat.modified
        }
        Err(e) if e.is_not_found() => false,
        Err(e) => return Err(e),
    };
    if up_to_date {
        return Ok(false);
    }

    if let Some(parent) = dst.parent() {
        fs.create_dir_all(parent)?;
    }
    fs.copy_with_times(src, dst, src_stat.accessed, src_stat.modified)?;
    Ok(true)
}

/// Remove `path` if it is a file. Absence is not an error; directories are
/// left alone.
pub fn remove_if_present(fs: &dyn FileSystem, path: &Path) -> FsResult<bool> {
    match fs.stat(path) {
        Ok(stat) if stat.kind == EntryKind::Dir => {
            debug!(?path, "output path is a directory; not removing");
            Ok(false)
        }
        Ok(_) => match fs.remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        },
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Bring one relative path in the output tree in line with the source tree.
///
/// The source is stat-ed at call time, so the result reflects the current
/// state of the source rather than whichever event caused the call. A source
/// that vanishes between the stat and the copy is handled like a delete.
pub fn sync_path(
    fs: &dyn FileSystem,
    src_root: &Path,
    out_root: &Path,
    rel: &str,
) -> FsResult<SyncAction> {
    let src = src_root.join(rel);
    let dst = out_root.join(rel);

    let is_file = match fs.stat(&src) {
        Ok(stat) => stat.is_file(),
        Err(e) if e.is_not_found() => false,
        Err(e) => return Err(e),
    };

    if is_file {
        match copy_if_different(fs, &src, &dst) {
            Ok(true) => return Ok(SyncAction::Copied),
            Ok(false) => return Ok(SyncAction::Unchanged),
            Err(e) if e.is_not_found() && e.path == src => {
                debug!(?src, "source vanished before copy; treating as delete");
            }
            Err(e) => return Err(e),
        }
    }

    if remove_if_present(fs, &dst)? {
        Ok(SyncAction::Removed)
    } else {
        Ok(SyncAction::AlreadyAbsent)
    }
}

/// Walk `src_root` and copy every file matching `globs` into `out_root`.
///
/// Directories and files that don't match are skipped. Running this twice
/// with no source changes performs no writes the second time.
pub fn reconcile_tree(
    fs: &dyn FileSystem,
    src_root: &Path,
    out_root: &Path,
    globs: &GlobSpec,
) -> FsResult<ReconcileStats> {
    reconcile_tree_until(fs, src_root, out_root, globs, &|| false)
}

/// Like [`reconcile_tree`], but checks `halt` before each file and returns
/// the partial stats once it reports true.
pub fn reconcile_tree_until(
    fs: &dyn FileSystem,
    src_root: &Path,
    out_root: &Path,
    globs: &GlobSpec,
    halt: &dyn Fn() -> bool,
) -> FsResult<ReconcileStats> {
    let mut stats = ReconcileStats::default();
    for (rel, src) in collect_matching_files(fs, src_root, globs)? {
        if halt() {
            debug!(copied = stats.copied, "reconciliation halted");
            break;
        }
        stats.matched += 1;
        let dst = out_root.join(&rel);
        match copy_if_different(fs, &src, &dst) {
            Ok(true) => {
                debug!(path = %rel, "copied");
                stats.copied += 1;
            }
            Ok(false) => {}
            Err(e) if e.is_not_found() && e.path == src => {
                debug!(path = %rel, "source vanished during reconciliation");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(stats)
}

/// Collect all regular files under `root` whose relative path matches `globs`.
///
/// Returns `(relative, absolute)` pairs, with relative paths using `/`.
pub fn collect_matching_files(
    fs: &dyn FileSystem,
    root: &Path,
    globs: &GlobSpec,
) -> FsResult<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            let kind = match fs.stat(&path) {
                Ok(stat) => stat.kind,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            };
            match kind {
                EntryKind::Dir => stack.push(path),
                EntryKind::File => {
                    if let Ok(rel) = path.strip_prefix(root) {
                        let rel_str = rel.to_string_lossy().replace('\\', "/");
                        if globs.matches(&rel_str) {
                            files.push((rel_str, path));
                        }
                    }
                }
                EntryKind::Other => {}
            }
        }
    }

    files.sort();
    Ok(files)
}
