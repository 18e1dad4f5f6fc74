//! Error taxonomy
//!
//! Only [`FatalSetupError`] is allowed to terminate a run. Everything else is
//! captured as a structured result inside the current round report.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Permission or IO problems while walking the tree
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("walk error: {0}")]
    Walk(String),
}

/// Failures of the quarantine code path
#[derive(Debug, Error)]
pub enum QuarantineError {
    #[error("source file {0} does not exist")]
    MissingSource(PathBuf),

    #[error("destination {0} already exists in this run")]
    DestinationExists(PathBuf),

    #[error("copy of {path} could not be verified (expected {expected}, found {actual})")]
    VerificationFailed {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("restore index {path} is unreadable: {message}")]
    Index { path: PathBuf, message: String },
}

impl QuarantineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        QuarantineError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Problems spawning or supervising an external tool
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("'{0}' is not installed")]
    NotInstalled(String),

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' timed out after {secs}s and was killed")]
    TimedOut { program: String, secs: u64 },

    #[error("'{program}' exited with {code:?}: {stderr_tail}")]
    NonZeroExit {
        program: String,
        code: Option<i32>,
        stderr_tail: String,
    },
}

/// Advisory lock problems
#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock {path} is held by pid {pid} (lease valid until {expires_at})")]
    Held {
        path: PathBuf,
        pid: u32,
        expires_at: String,
    },

    #[error("cannot write lock {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The only error class permitted to abort a run
#[derive(Debug, Error, Diagnostic)]
pub enum FatalSetupError {
    #[error("cannot create directory {path}: {source}")]
    #[diagnostic(
        code(repohygiene::setup::directory),
        help("check that the repository root is writable")
    )]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot acquire orchestrator lock: {0}")]
    #[diagnostic(
        code(repohygiene::setup::lock),
        help("another instance may be running; wait for it or remove a stale lock file")
    )]
    Lock(#[from] LockError),

    #[error("invalid configuration {path}: {message}")]
    #[diagnostic(code(repohygiene::setup::config))]
    Config { path: PathBuf, message: String },

    #[error("cannot install signal handler: {0}")]
    #[diagnostic(code(repohygiene::setup::signal))]
    Signal(String),

    #[error("cannot write report {path}: {message}")]
    #[diagnostic(code(repohygiene::setup::report))]
    Report { path: PathBuf, message: String },
}

impl FatalSetupError {
    pub fn directory(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FatalSetupError::Directory {
            path: path.into(),
            source,
        }
    }
}
