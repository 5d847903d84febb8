#![allow(dead_code)]

use std::error::Error;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub use devwatch_test_utils::{init_tracing, with_timeout, with_timeout_secs};

pub type TestResult = Result<(), Box<dyn Error>>;

/// Write `contents` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

/// Poll `cond` every 20ms until it holds or `timeout` elapses.
pub async fn wait_until<F>(timeout: Duration, mut cond: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
