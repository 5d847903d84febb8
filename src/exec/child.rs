// src/exec/child.rs

//! Supervised child processes.
//!
//! A [`ManagedChild`] owns nothing but handles: the `tokio::process::Child`
//! itself lives in a background waiter task, which reaps it and publishes
//! the exit status on a `watch` channel. Termination requests travel to the
//! waiter over a channel, so they can be sent from synchronous contexts such
//! as a [`CancelToken`] listener.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::errors::{DevwatchError, Result};
use crate::exec::output::spawn_line_pump;

/// How to launch a child process.
#[derive(Debug, Clone, Default)]
pub struct SpawnSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
}

impl SpawnSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ExitInfo {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for ExitInfo {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(sig)) => write!(f, "killed by signal {sig}"),
            (None, None) => write!(f, "unknown exit status"),
        }
    }
}

/// Handle to a running (or finished) child process.
#[derive(Debug)]
pub struct ManagedChild {
    name: String,
    pid: Option<u32>,
    term_tx: mpsc::UnboundedSender<()>,
    exit_rx: watch::Receiver<Option<ExitInfo>>,
    stop_requested: Arc<AtomicBool>,
}

impl ManagedChild {
    /// Spawn `spec` with stdout and stderr piped into one line channel.
    ///
    /// The returned receiver yields combined output lines until both streams
    /// close.
    pub fn spawn(name: &str, spec: &SpawnSpec) -> Result<(Self, mpsc::Receiver<String>)> {
        info!(task = %name, cmd = %spec.command_line(), "starting process");

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| DevwatchError::Spawn {
            program: spec.program.clone(),
            source,
        })?;
        let pid = child.id();

        let (line_tx, line_rx) = mpsc::channel::<String>(256);
        if let Some(stdout) = child.stdout.take() {
            spawn_line_pump(stdout, line_tx.clone(), name.to_string(), "stdout");
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_line_pump(stderr, line_tx, name.to_string(), "stderr");
        }

        let (term_tx, term_rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = watch::channel(None);
        spawn_waiter(name.to_string(), child, term_rx, exit_tx);

        Ok((
            Self {
                name: name.to_string(),
                pid,
                term_tx,
                exit_rx,
                stop_requested: Arc::new(AtomicBool::new(false)),
            },
            line_rx,
        ))
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// The exit status, if the process has already been reaped.
    pub fn exit_info(&self) -> Option<ExitInfo> {
        *self.exit_rx.borrow()
    }

    pub fn has_exited(&self) -> bool {
        self.exit_info().is_some()
    }

    /// Whether a termination was requested, through [`terminate`](Self::terminate)
    /// or through the cancellation token.
    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// Ask the process to shut down gracefully (`SIGTERM` on Unix).
    ///
    /// Never escalates to a kill. Safe to call repeatedly or after exit.
    pub fn terminate(&self) {
        request_termination(&self.name, &self.stop_requested, &self.term_tx);
    }

    /// Deliver a termination request when `token` fires.
    pub fn terminate_on(&self, token: &CancelToken) {
        let name = self.name.clone();
        let flag = Arc::clone(&self.stop_requested);
        let tx = self.term_tx.clone();
        token.on_trigger(move |reason| {
            debug!(task = %name, %reason, "cancellation -> terminating process");
            request_termination(&name, &flag, &tx);
        });
    }

    /// Wait for the process to exit.
    pub async fn wait(&self) -> ExitInfo {
        let mut rx = self.exit_rx.clone();
        match rx.wait_for(Option::is_some).await {
            Ok(info) => info.unwrap_or_default(),
            // Waiter task is gone without publishing; nothing left to wait on.
            Err(_) => ExitInfo::default(),
        }
    }
}

fn request_termination(name: &str, flag: &AtomicBool, tx: &mpsc::UnboundedSender<()>) {
    if flag.swap(true, Ordering::SeqCst) {
        debug!(task = %name, "termination already requested");
        return;
    }
    if tx.send(()).is_err() {
        debug!(task = %name, "process already exited; nothing to terminate");
    }
}

fn spawn_waiter(
    name: String,
    mut child: Child,
    mut term_rx: mpsc::UnboundedReceiver<()>,
    exit_tx: watch::Sender<Option<ExitInfo>>,
) {
    tokio::spawn(async move {
        let status = tokio::select! {
            status = child.wait() => status,
            _ = term_rx.recv() => {
                send_graceful_termination(&name, &mut child);
                child.wait().await
            }
        };

        let info = match status {
            Ok(status) => ExitInfo::from(status),
            Err(err) => {
                warn!(task = %name, error = %err, "failed to wait for process");
                ExitInfo::default()
            }
        };
        info!(task = %name, status = %info, "process exited");
        let _ = exit_tx.send(Some(info));
    });
}

#[cfg(unix)]
fn send_graceful_termination(name: &str, child: &mut Child) {
    use nix::errno::Errno;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        debug!(task = %name, "process already reaped");
        return;
    };
    match signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        Ok(()) => info!(task = %name, pid, "sent SIGTERM"),
        Err(Errno::ESRCH) => debug!(task = %name, pid, "process already gone"),
        Err(e) => warn!(task = %name, pid, error = %e, "failed to send SIGTERM"),
    }
}

#[cfg(not(unix))]
fn send_graceful_termination(name: &str, child: &mut Child) {
    if let Err(e) = child.start_kill() {
        warn!(task = %name, error = %e, "failed to terminate process");
    }
}
