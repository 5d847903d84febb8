// src/supervisor/shutdown.rs

//! Coordinated shutdown.
//!
//! Once the token fires, every registered task is stopped concurrently.
//! Each outcome is captured on its own: a failing or panicking `stop()` is
//! logged against that task and never prevents the others from being
//! awaited. The per-task summary goes to tracing and, when a console
//! logger is supplied, to the user's terminal as well.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{error, info};

use crate::cancel::CancelToken;
use crate::console::{log_line, TaskLogger};
use crate::tasks::Task;

/// Outcome of stopping one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopReport {
    pub task: String,
    pub result: std::result::Result<(), String>,
}

impl StopReport {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

impl fmt::Display for StopReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            Ok(()) => write!(f, "{}: stopped", self.task),
            Err(e) => write!(f, "{}: failed to stop: {e}", self.task),
        }
    }
}

/// Wait for `token`, then stop all `tasks` and report on each, in
/// registration order.
pub async fn cleanup_after_cancel(
    token: CancelToken,
    tasks: Vec<Arc<dyn Task>>,
    console: Option<TaskLogger>,
) -> Vec<StopReport> {
    token.cancelled().await;
    match token.reason() {
        Some(reason) => {
            info!(%reason, "shutting down {} task(s)", tasks.len());
            log_line(&console, &format!("shutting down: {reason}"));
        }
        None => info!("shutting down {} task(s)", tasks.len()),
    }
    stop_all(tasks, console).await
}

/// Stop every task concurrently and collect one report per task.
pub async fn stop_all(tasks: Vec<Arc<dyn Task>>, console: Option<TaskLogger>) -> Vec<StopReport> {
    let names: Vec<String> = tasks.iter().map(|t| t.name().to_string()).collect();
    let mut set = JoinSet::new();
    let mut index_by_id = HashMap::new();

    for (idx, task) in tasks.into_iter().enumerate() {
        let handle = set.spawn(async move {
            let res = task.stop().await;
            res.map_err(|e| e.to_string())
        });
        index_by_id.insert(handle.id(), idx);
    }

    let mut results: Vec<Option<std::result::Result<(), String>>> = vec![None; names.len()];
    while let Some(joined) = set.join_next_with_id().await {
        let (id, res) = match joined {
            Ok((id, res)) => (id, res),
            Err(join_err) => (join_err.id(), Err(format!("stop panicked: {join_err}"))),
        };
        if let Some(&idx) = index_by_id.get(&id) {
            results[idx] = Some(res);
        }
    }

    let reports: Vec<StopReport> = names
        .into_iter()
        .zip(results)
        .map(|(task, res)| StopReport {
            task,
            result: res.unwrap_or_else(|| Err("stop outcome lost".to_string())),
        })
        .collect();

    for report in &reports {
        match &report.result {
            Ok(()) => info!(task = %report.task, "stopped"),
            Err(e) => error!(task = %report.task, error = %e, "failed to stop"),
        }
        log_line(&console, &report.to_string());
    }
    info!("shutdown complete");
    log_line(&console, "shutdown complete");
    reports
}
