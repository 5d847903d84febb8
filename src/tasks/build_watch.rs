// src/tasks/build_watch.rs

//! Incremental compiler running in watch mode.
//!
//! The compiler's terminal output is captured rather than inherited: lines
//! go to the task's [`TaskLogger`] and clear-screen requests are forwarded
//! as [`TaskLogger::clear`]. Diagnostics are not parsed; they are just more
//! output lines.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::anyhow;
use regex::Regex;
use tracing::info;

use crate::cancel::CancelToken;
use crate::console::TaskLogger;
use crate::errors::{DevwatchError, Result};
use crate::exec::{spawn_output_monitor, ManagedChild, SpawnSpec};
use crate::tasks::{StopFuture, Task};

#[derive(Debug)]
pub struct BuildWatchTask {
    name: String,
    spec: SpawnSpec,
    first_build: Regex,
    token: CancelToken,
    logger: Option<TaskLogger>,
    started: AtomicBool,
    child: OnceLock<ManagedChild>,
}

impl BuildWatchTask {
    /// `first_build` must match the line the compiler prints once its first
    /// build finishes (with or without errors).
    pub fn new(
        name: impl Into<String>,
        spec: SpawnSpec,
        first_build: Regex,
        token: CancelToken,
        logger: Option<TaskLogger>,
    ) -> Self {
        Self {
            name: name.into(),
            spec,
            first_build,
            token,
            logger,
            started: AtomicBool::new(false),
            child: OnceLock::new(),
        }
    }

    /// Launch the compiler and wait for its first build to finish.
    ///
    /// Installs a cancellation listener that closes the watch program
    /// exactly once. Fails with [`DevwatchError::BuildFailed`] if the
    /// compiler's output ends before the first build completes.
    pub async fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(DevwatchError::Other(anyhow!("task '{}' already started", self.name)));
        }

        let (child, lines) = ManagedChild::spawn(&self.name, &self.spec)?;
        child.terminate_on(&self.token);
        let ready = spawn_output_monitor(
            self.name.clone(),
            lines,
            self.logger.clone(),
            self.first_build.clone(),
        );
        let child = self.child.get_or_init(|| child);

        if ready.await.unwrap_or(false) {
            info!(task = %self.name, "first build finished; watching for changes");
            return Ok(());
        }

        let exit = child.wait().await;
        Err(DevwatchError::BuildFailed(format!(
            "'{}' exited before its first build completed ({exit})",
            self.spec.program
        )))
    }
}

impl Task for BuildWatchTask {
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
            if let Some(child) = self.child.get() {
                let exit = child.wait().await;
                info!(task = %self.name, status = %exit, "watch program closed");
            }
            Ok(())
        })
    }
}
