// src/tasks/mod.rs

//! Long-running development tasks managed by the supervisor.
//!
//! Every task shares the supervisor's [`CancelToken`] and can be stopped
//! through the object-safe [`Task`] trait. Starting is variant-specific:
//!
//! - [`DirSyncTask`] mirrors static assets from the source tree to the
//!   output tree, then keeps them in sync.
//! - [`BuildWatchTask`] runs the incremental compiler in watch mode.
//! - [`SubprocessTask`] runs the local backend emulator.

use std::future::Future;
use std::pin::Pin;

use crate::cancel::CancelToken;
use crate::errors::Result;

pub mod build_watch;
pub mod dir_sync;
pub mod subprocess;

pub use build_watch::BuildWatchTask;
pub use dir_sync::{DirSyncOptions, DirSyncTask};
pub use subprocess::SubprocessTask;

/// Future returned by [`Task::stop`].
pub type StopFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Capability shared by all supervised tasks.
pub trait Task: Send + Sync {
    /// Short identifier used in logs and shutdown reports.
    fn name(&self) -> &str;

    fn cancel_token(&self) -> &CancelToken;

    /// Resolve once the task has released its resources.
    ///
    /// Directory sync and build watch tasks require the token to be
    /// triggered first and fail with
    /// [`DevwatchError::StopBeforeCancel`](crate::errors::DevwatchError::StopBeforeCancel)
    /// otherwise. The subprocess task can be stopped at any time, any
    /// number of times.
    fn stop(&self) -> StopFuture<'_>;
}
