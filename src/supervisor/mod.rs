// src/supervisor/mod.rs

//! Task supervisor.
//!
//! Lifecycle of one run:
//!
//! 1. Register signal handlers ([`Supervisor::install_signal_handlers`]).
//! 2. [`Supervisor::run`] registers every task, arms the cleanup future
//!    (gated on the token), and starts all tasks concurrently.
//! 3. "All ready" is raced against the startup timeout. A timeout or a
//!    failed start triggers the token with a distinguishable reason.
//! 4. The supervisor idles until the token fires, then waits for cleanup
//!    to stop every task and returns a [`RunSummary`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info};

use crate::cancel::{CancelReason, CancelToken};
use crate::console::TaskLogger;
use crate::errors::{DevwatchError, Result};
use crate::tasks::Task;

pub mod shutdown;
pub mod signals;

pub use shutdown::{cleanup_after_cancel, stop_all, StopReport};

/// Default window for every task to report ready.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(20);

/// Resolves `Ok(())` once a task is ready to serve.
pub type ReadyFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// A task plus the future that reports its readiness.
pub struct TaskLaunch {
    pub task: Arc<dyn Task>,
    pub ready: ReadyFuture,
}

impl TaskLaunch {
    pub fn new<F>(task: Arc<dyn Task>, ready: F) -> Self
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            task,
            ready: Box::pin(ready),
        }
    }
}

/// Process exit codes for the ways a run can end.
pub mod exit_code {
    pub const CLEAN: i32 = 0;
    pub const CONFIG: i32 = 1;
    pub const BUILD_FAILED: i32 = 2;
    pub const STARTUP_TIMEOUT: i32 = 3;
    pub const STARTUP_FAILED: i32 = 4;
    pub const RUNTIME_FAILURE: i32 = 5;
}

/// How a supervised run ended.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub reason: CancelReason,
    pub reports: Vec<StopReport>,
}

impl RunSummary {
    pub fn exit_code(&self) -> i32 {
        match &self.reason {
            CancelReason::Signal(_) => exit_code::CLEAN,
            CancelReason::BuildFailed { .. } => exit_code::BUILD_FAILED,
            CancelReason::StartupTimeout => exit_code::STARTUP_TIMEOUT,
            CancelReason::StartupFailed { .. } => exit_code::STARTUP_FAILED,
            CancelReason::SubprocessExited { .. } | CancelReason::TaskFailed { .. } => {
                exit_code::RUNTIME_FAILURE
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SupervisorOptions {
    pub startup_timeout: Duration,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }
}

#[derive(Debug)]
pub struct Supervisor {
    token: CancelToken,
    options: SupervisorOptions,
    console: Option<TaskLogger>,
}

impl Supervisor {
    pub fn new(token: CancelToken, options: SupervisorOptions) -> Self {
        Self {
            token,
            options,
            console: None,
        }
    }

    /// Also write the shutdown summary through `logger`.
    pub fn with_console(mut self, logger: TaskLogger) -> Self {
        self.console = Some(logger);
        self
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Route `SIGINT`/`SIGTERM` into the token. Call before starting tasks.
    pub fn install_signal_handlers(&self) -> Result<JoinHandle<()>> {
        signals::install_signal_handlers(self.token.clone())
    }

    /// Start every task, wait for shutdown, stop everything.
    pub async fn run(&self, launches: Vec<TaskLaunch>) -> RunSummary {
        let registry: Vec<Arc<dyn Task>> = launches.iter().map(|l| Arc::clone(&l.task)).collect();
        let cleanup = tokio::spawn(cleanup_after_cancel(
            self.token.clone(),
            registry,
            self.console.clone(),
        ));

        let mut ready_set = JoinSet::new();
        for launch in launches {
            let name = launch.task.name().to_string();
            let ready = launch.ready;
            ready_set.spawn(async move { (name, ready.await) });
        }

        info!(
            count = ready_set.len(),
            timeout_ms = self.options.startup_timeout.as_millis() as u64,
            "starting tasks"
        );

        tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                info!("cancelled while starting");
            }
            res = tokio::time::timeout(self.options.startup_timeout, wait_all_ready(&mut ready_set)) => {
                match res {
                    Ok(Ok(())) => info!("all tasks ready"),
                    Ok(Err(reason)) => {
                        error!(%reason, "startup failed");
                        self.token.trigger(reason);
                    }
                    Err(_) => {
                        error!(
                            timeout_ms = self.options.startup_timeout.as_millis() as u64,
                            "tasks did not become ready in time"
                        );
                        self.token.trigger(CancelReason::StartupTimeout);
                    }
                }
            }
        }
        // Startups still pending are abandoned; their tasks are stopped below.
        ready_set.abort_all();

        self.token.cancelled().await;
        let reports = match cleanup.await {
            Ok(reports) => reports,
            Err(e) => {
                error!(error = %e, "cleanup task failed");
                Vec::new()
            }
        };

        let reason = self
            .token
            .reason()
            .cloned()
            .unwrap_or(CancelReason::Signal("unknown".to_string()));
        RunSummary { reason, reports }
    }
}

async fn wait_all_ready(
    set: &mut JoinSet<(String, Result<()>)>,
) -> std::result::Result<(), CancelReason> {
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((name, Ok(()))) => debug!(task = %name, "ready"),
            Ok((name, Err(DevwatchError::BuildFailed(msg)))) => {
                return Err(CancelReason::BuildFailed {
                    task: name,
                    error: msg,
                });
            }
            Ok((name, Err(err))) => {
                return Err(CancelReason::StartupFailed {
                    task: name,
                    error: err.to_string(),
                });
            }
            Err(join_err) => {
                return Err(CancelReason::StartupFailed {
                    task: "unknown".to_string(),
                    error: join_err.to_string(),
                });
            }
        }
    }
    Ok(())
}
