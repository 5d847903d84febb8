// src/tasks/dir_sync.rs

//! Directory mirror task.
//!
//! `start()` runs one full reconciliation pass and then installs a recursive
//! watcher on the source tree. Watcher events for matching paths are
//! debounced per path; when a path's quiet window elapses, a handler re-stats
//! the source and copies or deletes the corresponding output file. At most
//! one handler runs per path; a path that comes due while its handler is
//! still running is parked and handled again once that handler finishes.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::anyhow;
use notify::{Event, EventKind};
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::cancel::{CancelReason, CancelToken};
use crate::console::{log_line, TaskLogger};
use crate::errors::{DevwatchError, FsResult, Result};
use crate::fs::mirror::{reconcile_tree_until, sync_path, ReconcileStats, SyncAction};
use crate::fs::FileSystem;
use crate::tasks::{StopFuture, Task};
use crate::watch::path_utils::relative_str;
use crate::watch::{watch_recursive, DebounceTable, GlobSpec, WatcherHandle};

/// Default quiet window before a path's pending event is handled.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(25);

#[derive(Debug, Clone)]
pub struct DirSyncOptions {
    pub source: PathBuf,
    pub output: PathBuf,
    pub globs: GlobSpec,
    pub debounce: Duration,
    /// Run still-pending handlers on cancellation instead of dropping them.
    pub flush_on_cancel: bool,
}

impl DirSyncOptions {
    pub fn new(source: impl Into<PathBuf>, output: impl Into<PathBuf>, globs: GlobSpec) -> Self {
        Self {
            source: source.into(),
            output: output.into(),
            globs,
            debounce: DEFAULT_DEBOUNCE,
            flush_on_cancel: false,
        }
    }
}

pub struct DirSyncTask {
    name: String,
    opts: Arc<DirSyncOptions>,
    fs: Arc<dyn FileSystem>,
    token: CancelToken,
    logger: Option<TaskLogger>,
    started: AtomicBool,
    /// Held for the whole of `start()`; `stop()` takes the loop handle from it.
    watch_loop: Mutex<Option<JoinHandle<Result<()>>>>,
    /// Held by the blocking initial pass until it returns, even if the
    /// `start()` future was dropped.
    initial_pass: Arc<Mutex<()>>,
}

impl std::fmt::Debug for DirSyncTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirSyncTask")
            .field("name", &self.name)
            .field("opts", &self.opts)
            .finish_non_exhaustive()
    }
}

impl DirSyncTask {
    pub fn new(
        name: impl Into<String>,
        opts: DirSyncOptions,
        fs: Arc<dyn FileSystem>,
        token: CancelToken,
        logger: Option<TaskLogger>,
    ) -> Self {
        Self {
            name: name.into(),
            opts: Arc::new(opts),
            fs,
            token,
            logger,
            started: AtomicBool::new(false),
            watch_loop: Mutex::new(None),
            initial_pass: Arc::new(Mutex::new(())),
        }
    }

    pub fn options(&self) -> &DirSyncOptions {
        &self.opts
    }

    /// Run the initial reconciliation pass, then start watching.
    ///
    /// Resolves once the watcher is registered. If cancellation fires during
    /// the pass, the pass stops before its next file and watching is skipped.
    pub async fn start(&self) -> Result<ReconcileStats> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(DevwatchError::Other(anyhow!("task '{}' already started", self.name)));
        }
        let mut slot = self.watch_loop.lock().await;

        let pass = Arc::clone(&self.initial_pass).lock_owned().await;
        let stats = run_pass(
            Arc::clone(&self.fs),
            Arc::clone(&self.opts),
            Some(self.token.clone()),
            Some(pass),
        )
        .await?;
        info!(task = %self.name, matched = stats.matched, copied = stats.copied, "initial sync complete");
        log_line(
            &self.logger,
            &format!("initial sync: {} of {} matching files copied", stats.copied, stats.matched),
        );

        if self.token.is_aborted() {
            debug!(task = %self.name, "cancelled during initial sync; not watching");
            return Ok(stats);
        }

        let (watcher, events) = watch_recursive(&self.opts.source)?;
        let ctx = LoopCtx {
            name: self.name.clone(),
            opts: Arc::clone(&self.opts),
            fs: Arc::clone(&self.fs),
            logger: self.logger.clone(),
        };
        let token = self.token.clone();
        *slot = Some(tokio::spawn(async move {
            let name = ctx.name.clone();
            let res = ctx.run(watcher, events, token.clone()).await;
            if let Err(err) = &res {
                error!(task = %name, error = %err, "watch loop failed");
                token.trigger(CancelReason::TaskFailed {
                    task: name,
                    error: err.to_string(),
                });
            }
            res
        }));

        Ok(stats)
    }
}

impl Task for DirSyncTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn cancel_token(&self) -> &CancelToken {
        &self.token
    }

    fn stop(&self) -> StopFuture<'_> {
        Box::pin(async move {
            if !self.token.is_aborted() {
                return Err(DevwatchError::StopBeforeCancel(self.name.clone()));
            }
            let handle = self.watch_loop.lock().await.take();
            // A pass whose `start()` was aborted may still be copying.
            let _pass = self.initial_pass.lock().await;
            match handle {
                Some(handle) => handle.await.map_err(|e| DevwatchError::Other(anyhow!(e)))?,
                None => Ok(()),
            }
        })
    }
}

/// Run a full pass on the blocking pool.
pub async fn reconcile_once(
    fs: Arc<dyn FileSystem>,
    opts: Arc<DirSyncOptions>,
) -> Result<ReconcileStats> {
    run_pass(fs, opts, None, None).await
}

async fn run_pass(
    fs: Arc<dyn FileSystem>,
    opts: Arc<DirSyncOptions>,
    token: Option<CancelToken>,
    guard: Option<OwnedMutexGuard<()>>,
) -> Result<ReconcileStats> {
    tokio::task::spawn_blocking(move || {
        let _guard = guard;
        let halt = || token.as_ref().is_some_and(CancelToken::is_aborted);
        reconcile_tree_until(fs.as_ref(), &opts.source, &opts.output, &opts.globs, &halt)
    })
    .await
    .map_err(|e| DevwatchError::Other(anyhow!(e)))?
    .map_err(DevwatchError::from)
}

type HandlerOutput = (String, FsResult<SyncAction>);

/// Running handlers, keyed by path, plus the follow-ups parked behind them.
#[derive(Default)]
struct Handlers {
    set: JoinSet<HandlerOutput>,
    running: HashSet<String>,
    parked: HashMap<String, EventKind>,
}

struct LoopCtx {
    name: String,
    opts: Arc<DirSyncOptions>,
    fs: Arc<dyn FileSystem>,
    logger: Option<TaskLogger>,
}

impl LoopCtx {
    async fn run(
        &self,
        watcher: WatcherHandle,
        mut events: mpsc::UnboundedReceiver<Event>,
        token: CancelToken,
    ) -> Result<()> {
        let root = watcher.root().to_path_buf();
        let mut pending: DebounceTable<String, EventKind> = DebounceTable::new(self.opts.debounce);
        let mut handlers = Handlers::default();

        loop {
            let deadline = pending.next_deadline();
            tokio::select! {
                biased;

                _ = token.cancelled() => break,

                Some(done) = handlers.set.join_next(), if !handlers.set.is_empty() => {
                    self.finish(&mut handlers, done, true)?;
                }

                maybe = events.recv() => match maybe {
                    Some(event) => self.enqueue(&root, &mut pending, event),
                    None => {
                        warn!(task = %self.name, "watcher channel closed; stopping watch loop");
                        break;
                    }
                },

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    for (rel, kind) in pending.take_due(Instant::now()) {
                        self.dispatch(&mut handlers, rel, kind);
                    }
                }
            }
        }

        if self.opts.flush_on_cancel {
            let flushed = pending.drain();
            debug!(task = %self.name, count = flushed.len(), "flushing pending events");
            for (rel, kind) in flushed {
                self.dispatch(&mut handlers, rel, kind);
            }
        } else {
            let dropped = pending.discard() + handlers.parked.len();
            handlers.parked.clear();
            debug!(task = %self.name, count = dropped, "discarding pending events");
        }
        drop(watcher);

        let mut first_err = None;
        while let Some(done) = handlers.set.join_next().await {
            let follow_up = self.opts.flush_on_cancel;
            if let Err(err) = self.finish(&mut handlers, done, follow_up) {
                first_err.get_or_insert(err);
            }
        }
        debug!(task = %self.name, "watch loop finished");
        first_err.map_or(Ok(()), Err)
    }

    fn enqueue(&self, root: &Path, pending: &mut DebounceTable<String, EventKind>, event: Event) {
        if matches!(event.kind, EventKind::Access(_)) {
            return;
        }
        let now = Instant::now();
        for path in &event.paths {
            let Some(rel) = relative_str(root, path) else {
                continue;
            };
            if !self.opts.globs.matches(&rel) {
                continue;
            }
            debug!(task = %self.name, path = %rel, kind = ?event.kind, "change queued");
            pending.schedule(rel, event.kind, now);
        }
    }

    fn dispatch(&self, handlers: &mut Handlers, rel: String, kind: EventKind) {
        if handlers.running.contains(&rel) {
            debug!(task = %self.name, path = %rel, ?kind, "handler still running; parked");
            handlers.parked.insert(rel, kind);
            return;
        }
        debug!(task = %self.name, path = %rel, ?kind, "handling change");
        handlers.running.insert(rel.clone());
        let fs = Arc::clone(&self.fs);
        let opts = Arc::clone(&self.opts);
        handlers.set.spawn_blocking(move || {
            let res = sync_path(fs.as_ref(), &opts.source, &opts.output, &rel);
            (rel, res)
        });
    }

    /// Record a finished handler and dispatch the path's parked follow-up,
    /// if any and `follow_up` is set.
    fn finish(
        &self,
        handlers: &mut Handlers,
        done: std::result::Result<HandlerOutput, JoinError>,
        follow_up: bool,
    ) -> Result<()> {
        let (rel, res) = done.map_err(|e| DevwatchError::Other(anyhow!(e)))?;
        handlers.running.remove(&rel);
        let outcome = self.report(&rel, res);
        if let Some(kind) = handlers.parked.remove(&rel) {
            if follow_up && outcome.is_ok() {
                self.dispatch(handlers, rel, kind);
            }
        }
        outcome
    }

    fn report(&self, rel: &str, res: FsResult<SyncAction>) -> Result<()> {
        match res? {
            SyncAction::Copied => {
                info!(task = %self.name, path = %rel, "copied");
                log_line(&self.logger, &format!("copied {rel}"));
            }
            SyncAction::Removed => {
                info!(task = %self.name, path = %rel, "removed");
                log_line(&self.logger, &format!("removed {rel}"));
            }
            action => debug!(task = %self.name, path = %rel, ?action, "nothing to do"),
        }
        Ok(())
    }
}
