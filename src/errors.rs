// src/errors.rs

//! Crate-wide error types.
//!
//! [`DevwatchError`] is what library code returns. Filesystem operations
//! return the narrower [`FsError`], whose [`FsErrorKind`] lets callers tell a
//! "not found" race apart from a real I/O failure without poking at raw OS
//! error codes.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DevwatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid project directory: {0}")]
    ProjectRoot(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Fs(#[from] FsError),

    #[error("invalid glob pattern '{pattern}': {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("initial build failed: {0}")]
    BuildFailed(String),

    #[error("did not become ready: {0}")]
    NotReady(String),

    #[error("task '{0}' was asked to stop before cancellation was triggered")]
    StopBeforeCancel(String),

    #[error("file watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, DevwatchError>;

/// Coarse classification of a filesystem failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsErrorKind {
    NotFound,
    AlreadyExists,
    NotADirectory,
    Other,
}

impl From<io::ErrorKind> for FsErrorKind {
    fn from(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::NotFound => FsErrorKind::NotFound,
            io::ErrorKind::AlreadyExists => FsErrorKind::AlreadyExists,
            io::ErrorKind::NotADirectory => FsErrorKind::NotADirectory,
            _ => FsErrorKind::Other,
        }
    }
}

impl fmt::Display for FsErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FsErrorKind::NotFound => "not found",
            FsErrorKind::AlreadyExists => "already exists",
            FsErrorKind::NotADirectory => "not a directory",
            FsErrorKind::Other => "io failure",
        };
        f.write_str(s)
    }
}

/// A filesystem failure tagged with its kind and the path involved.
#[derive(Error, Debug)]
#[error("{op} {path:?}: {kind}")]
pub struct FsError {
    pub kind: FsErrorKind,
    pub op: &'static str,
    pub path: PathBuf,
    #[source]
    pub source: Option<io::Error>,
}

impl FsError {
    pub fn from_io(op: &'static str, path: &Path, err: io::Error) -> Self {
        Self {
            kind: err.kind().into(),
            op,
            path: path.to_path_buf(),
            source: Some(err),
        }
    }

    pub fn new(kind: FsErrorKind, op: &'static str, path: &Path) -> Self {
        Self {
            kind,
            op,
            path: path.to_path_buf(),
            source: None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == FsErrorKind::NotFound
    }
}

pub type FsResult<T> = std::result::Result<T, FsError>;
