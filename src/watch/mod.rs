// src/watch/mod.rs

//! File watching building blocks.
//!
//! - [`patterns`] compiles the include/exclude glob set.
//! - [`watcher`] wires up a cross-platform recursive watcher (`notify`).
//! - [`debounce`] coalesces bursts of events per path.
//! - [`path_utils`] normalises event paths relative to the watched root.
//!
//! Nothing here knows what a change *means*; the directory sync task turns
//! debounced paths into copies and deletes.

pub mod debounce;
pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use debounce::DebounceTable;
pub use patterns::GlobSpec;
pub use watcher::{watch_recursive, WatcherHandle};
