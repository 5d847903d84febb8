// src/cancel.rs

//! One-shot, broadcast cancellation shared by the supervisor and every task.
//!
//! A [`CancelToken`] is a cheap clonable handle. The first call to
//! [`CancelToken::trigger`] stores its [`CancelReason`], wakes every future
//! waiting on [`CancelToken::cancelled`] and runs each registered listener
//! exactly once. Later triggers are ignored, so the first reason wins.

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};

use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Why a supervisor run is being torn down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelReason {
    /// An OS termination signal was received (e.g. `"SIGINT"`).
    Signal(String),
    /// Not every task became ready within the startup window.
    StartupTimeout,
    /// The compiler exited before finishing its first build.
    BuildFailed { task: String, error: String },
    /// A task failed while starting up.
    StartupFailed { task: String, error: String },
    /// The managed subprocess exited without being asked to.
    SubprocessExited { task: String, status: String },
    /// A task hit an unrecoverable error while running.
    TaskFailed { task: String, error: String },
}

impl CancelReason {
    /// True for reasons that mean the run did not end cleanly.
    pub fn is_failure(&self) -> bool {
        !matches!(self, CancelReason::Signal(_))
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Signal(sig) => write!(f, "received {sig}"),
            CancelReason::StartupTimeout => write!(f, "startup timed out"),
            CancelReason::BuildFailed { task, error } => {
                write!(f, "task '{task}' failed its initial build: {error}")
            }
            CancelReason::StartupFailed { task, error } => {
                write!(f, "task '{task}' failed to start: {error}")
            }
            CancelReason::SubprocessExited { task, status } => {
                write!(f, "task '{task}' exited unexpectedly ({status})")
            }
            CancelReason::TaskFailed { task, error } => {
                write!(f, "task '{task}' failed: {error}")
            }
        }
    }
}

type Listener = Box<dyn FnOnce(&CancelReason) + Send>;

struct Inner {
    token: CancellationToken,
    reason: OnceLock<CancelReason>,
    listeners: Mutex<Vec<Listener>>,
}

#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("reason", &self.inner.reason.get())
            .finish_non_exhaustive()
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                token: CancellationToken::new(),
                reason: OnceLock::new(),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Trigger cancellation.
    ///
    /// Returns `true` if this call performed the transition, `false` if the
    /// token was already triggered (in which case `reason` is discarded and
    /// no listener runs again).
    pub fn trigger(&self, reason: CancelReason) -> bool {
        if self.inner.reason.set(reason).is_err() {
            debug!("cancellation already triggered; ignoring repeat trigger");
            return false;
        }
        let Some(reason) = self.inner.reason.get() else {
            return false;
        };

        self.inner.token.cancel();

        let listeners = match self.inner.listeners.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for listener in listeners {
            listener(reason);
        }
        true
    }

    /// Register a callback to run once on trigger.
    ///
    /// If the token is already triggered, the callback runs immediately on
    /// the calling thread. Listeners must not block; they should only kick
    /// off their own teardown.
    pub fn on_trigger<F>(&self, listener: F)
    where
        F: FnOnce(&CancelReason) + Send + 'static,
    {
        {
            let mut guard = match self.inner.listeners.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            if self.inner.reason.get().is_none() {
                guard.push(Box::new(listener));
                return;
            }
        }
        if let Some(reason) = self.inner.reason.get() {
            listener(reason);
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.reason.get().is_some()
    }

    /// The reason given to the first successful [`trigger`](Self::trigger).
    pub fn reason(&self) -> Option<&CancelReason> {
        self.inner.reason.get()
    }

    /// Completes once the token has been triggered.
    pub async fn cancelled(&self) {
        self.inner.token.cancelled().await
    }

    /// Owned variant of [`cancelled`](Self::cancelled) for use in spawned tasks.
    pub fn cancelled_owned(&self) -> tokio_util::sync::WaitForCancellationFutureOwned {
        self.inner.token.clone().cancelled_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn first_reason_wins_and_listeners_fire_once() {
        let token = CancelToken::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let h = Arc::clone(&hits);
        token.on_trigger(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        assert!(token.trigger(CancelReason::Signal("SIGINT".into())));
        assert!(!token.trigger(CancelReason::StartupTimeout));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(token.reason(), Some(&CancelReason::Signal("SIGINT".into())));
        assert!(token.is_aborted());
    }

    #[test]
    fn late_listener_runs_immediately() {
        let token = CancelToken::new();
        token.trigger(CancelReason::StartupTimeout);

        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        token.on_trigger(move |reason| {
            assert_eq!(reason, &CancelReason::StartupTimeout);
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn clones_observe_the_same_trigger() {
        let token = CancelToken::new();
        let clone = token.clone();
        let waiter = tokio::spawn(async move {
            clone.cancelled().await;
            clone.reason().cloned()
        });

        token.trigger(CancelReason::Signal("SIGTERM".into()));
        let seen = waiter.await.unwrap();
        assert_eq!(seen, Some(CancelReason::Signal("SIGTERM".into())));
    }
}
