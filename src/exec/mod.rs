// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`child`] spawns a process with `tokio::process::Command`, reaps it in
//!   the background and delivers graceful termination requests.
//! - [`output`] pumps stdout/stderr into one line stream, strips
//!   clear-screen sequences and watches for readiness markers.

pub mod child;
pub mod output;

pub use child::{ExitInfo, ManagedChild, SpawnSpec};
pub use output::{literal_marker, spawn_output_monitor, split_clear};
