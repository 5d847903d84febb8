// src/watch/watcher.rs

use std::path::{Path, PathBuf};

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::errors::Result;

/// Handle for the filesystem watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive. Dropping this handle
/// stops file watching and closes the event channel.
pub struct WatcherHandle {
    root: PathBuf,
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl WatcherHandle {
    /// The (canonicalized, when possible) directory being watched.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Start watching `root` recursively.
///
/// Raw `notify` events are forwarded, unfiltered, into the returned channel.
/// Filtering and debouncing are the consumer's job.
pub fn watch_recursive(
    root: impl Into<PathBuf>,
) -> Result<(WatcherHandle, mpsc::UnboundedReceiver<Event>)> {
    let root = root.into();
    let root = root.canonicalize().unwrap_or(root);

    let (event_tx, event_rx) = mpsc::unbounded_channel::<Event>();

    // Called synchronously on notify's own thread.
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                // Receiver gone means the watch loop has exited.
                let _ = event_tx.send(event);
            }
            Err(err) => {
                warn!(error = %err, "file watch error");
            }
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;

    info!("file watcher started on {:?}", root);

    Ok((
        WatcherHandle {
            root,
            _inner: watcher,
        },
        event_rx,
    ))
}
