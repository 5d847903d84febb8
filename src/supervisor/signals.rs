// src/supervisor/signals.rs

//! OS signal wiring.
//!
//! On Unix, `SIGINT` and `SIGTERM` both trigger the shared token with the
//! signal's name as the reason. Elsewhere only Ctrl-C is handled. Handlers
//! are registered synchronously, before this returns, so a signal arriving
//! while tasks are still starting is not lost.

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cancel::{CancelReason, CancelToken};
use crate::errors::Result;

#[cfg(unix)]
pub fn install_signal_handlers(token: CancelToken) -> Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        loop {
            // Keeps listening after the first signal so a second Ctrl-C
            // during shutdown is reported instead of killing the process.
            let name = tokio::select! {
                _ = sigint.recv() => "SIGINT",
                _ = sigterm.recv() => "SIGTERM",
            };
            deliver(&token, name);
        }
    }))
}

#[cfg(not(unix))]
pub fn install_signal_handlers(token: CancelToken) -> Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            deliver(&token, "Ctrl-C");
        }
    }))
}

fn deliver(token: &CancelToken, name: &str) {
    if token.trigger(CancelReason::Signal(name.to_string())) {
        info!(signal = name, "received {name}; shutting down");
    } else {
        warn!(signal = name, "received {name} while already shutting down");
    }
}
