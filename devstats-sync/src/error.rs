//! Error types for devstats-sync.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Instance-marker failures.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another run holds the marker. Not a failure of this run.
    #[error("another devstats instance is running, PID file '{path}' exists")]
    AlreadyRunning { path: PathBuf },

    /// The marker could not be created, written, or removed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of one external step.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The program could not be started at all.
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran and exited unsuccessfully.
    #[error("'{program}' exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
}

/// Fatal orchestration errors. Step failures are never escalated here.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The instance marker could not be managed.
    #[error("instance lock error: {0}")]
    Lock(#[from] LockError),
}

/// Convenience constructor for [`LockError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> LockError {
    LockError::Io {
        path: path.into(),
        source,
    }
}
