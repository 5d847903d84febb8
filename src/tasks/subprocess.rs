// src/tasks/subprocess.rs

//! Supervised external process (the local backend emulator).

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use anyhow::anyhow;
use regex::Regex;
use tracing::{error, info};

use crate::cancel::{CancelReason, CancelToken};
use crate::console::TaskLogger;
use crate::errors::{DevwatchError, Result};
use crate::exec::{spawn_output_monitor, ExitInfo, ManagedChild, SpawnSpec};
use crate::tasks::{StopFuture, Task};

#[derive(Debug)]
pub struct SubprocessTask {
    name: String,
    spec: SpawnSpec,
    marker: Regex,
    token: CancelToken,
    logger: Option<TaskLogger>,
    started: AtomicBool,
    child: OnceLock<ManagedChild>,
}

impl SubprocessTask {
    pub fn new(
        name: impl Into<String>,
        spec: SpawnSpec,
        marker: Regex,
        token: CancelToken,
        logger: Option<TaskLogger>,
    ) -> Self {
        Self {
            name: name.into(),
            spec,
            marker,
            token,
            logger,
            started: AtomicBool::new(false),
            child: OnceLock::new(),
        }
    }

    /// Spawn the process.
    ///
    /// The returned future resolves `true` once the readiness marker shows
    /// up in the combined output, or `false` if output ends first. The
    /// process is also wired to receive a termination request when the
    /// shared token fires.
    pub fn start(&self) -> Result<impl Future<Output = bool> + Send + 'static> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(DevwatchError::Other(anyhow!("task '{}' already started", self.name)));
        }

        let (child, lines) = ManagedChild::spawn(&self.name, &self.spec)?;
        child.terminate_on(&self.token);
        let ready = spawn_output_monitor(
            self.name.clone(),
            lines,
            self.logger.clone(),
            self.marker.clone(),
        );
        let _ = self.child.set(child);

        Ok(async move { ready.await.unwrap_or(false) })
    }

    /// Wait for the process to exit. `None` if it was never started.
    pub async fn wait_exit(&self) -> Option<ExitInfo> {
        match self.child.get() {
            Some(child) => Some(child.wait().await),
            None => None,
        }
    }

    /// Whether the process was asked to stop (directly or via cancellation).
    pub fn stop_requested(&self) -> bool {
        self.child.get().is_some_and(ManagedChild::stop_requested)
    }

    pub fn has_exited(&self) -> bool {
        self.child.get().is_some_and(ManagedChild::has_exited)
    }

    /// Cancel the whole run if the process exits without being asked to.
    pub fn spawn_exit_monitor(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let Some(exit) = this.wait_exit().await else {
                return;
            };
            if this.stop_requested() {
                return;
            }
            error!(task = %this.name, status = %exit, "process exited unexpectedly");
            this.token.trigger(CancelReason::SubprocessExited {
                task: this.name.clone(),
                status: exit.to_string(),
            });
        });
    }
}

impl Task for SubprocessTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn cancel_token(&self) -> &CancelToken {
        &self.token
    }

    fn stop(&self) -> StopFuture<'_> {
        Box::pin(async move {
            let Some(child) = self.child.get() else {
                return Ok(());
            };
            if child.has_exited() {
                return Ok(());
            }
            child.terminate();
            let exit = child.wait().await;
            info!(task = %self.name, status = %exit, "process stopped");
            Ok(())
        })
    }
}
