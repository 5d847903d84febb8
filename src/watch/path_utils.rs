// src/watch/path_utils.rs

//! Path helpers for turning watcher event paths into glob-matchable strings.

use std::path::{Path, PathBuf};

/// Convert `path` into a `/`-separated string relative to `root`.
///
/// Watchers may report paths under a different absolute prefix than the
/// one we registered (symlinked temp dirs on macOS, for instance). When the
/// plain `strip_prefix` fails we canonicalize and retry. Deleted files can't
/// be canonicalized, so for those the nearest existing ancestor is
/// canonicalized and the missing tail re-attached.
///
/// Returns `None` for paths outside `root`, and for `root` itself.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Some(s) = strip(root, path) {
        return Some(s);
    }

    let root_canon = root.canonicalize().ok()?;
    let path_canon = canonicalize_lenient(path)?;
    strip(&root_canon, &path_canon)
}

fn strip(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    if rel.as_os_str().is_empty() {
        return None;
    }
    Some(rel.to_string_lossy().replace('\\', "/"))
}

fn canonicalize_lenient(path: &Path) -> Option<PathBuf> {
    if let Ok(p) = path.canonicalize() {
        return Some(p);
    }
    let mut tail = Vec::new();
    let mut cur = path;
    loop {
        tail.push(cur.file_name()?.to_os_string());
        cur = cur.parent()?;
        if let Ok(base) = cur.canonicalize() {
            let mut out = base;
            for part in tail.iter().rev() {
                out.push(part);
            }
            return Some(out);
        }
    }
}
