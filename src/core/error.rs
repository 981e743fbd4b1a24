//! Failure taxonomy for probing, listing and path resolution
//!
//! None of these reach the UI: every caller inside the core degrades to the
//! conservative reading (stopped VM, no containers, fallback path).

use std::path::PathBuf;

use thiserror::Error;

/// Discriminant of a [`MonitorError`], cheap to carry around in results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    SpawnFailed,
    ParseFailed,
    ResolveFailed,
}

#[derive(Debug, Error)]
pub enum MonitorError {
    /// The executable could not be launched (missing file, permission denied)
    #[error("failed to launch {}: {source}", program.display())]
    SpawnFailed {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Output did not have the expected shape
    #[error("unexpected command output: {0}")]
    ParseFailed(String),

    /// The path lookup produced no usable path
    #[error("could not resolve `{name}`: {reason}")]
    ResolveFailed { name: String, reason: String },
}

impl MonitorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SpawnFailed { .. } => ErrorKind::SpawnFailed,
            Self::ParseFailed(_) => ErrorKind::ParseFailed,
            Self::ResolveFailed { .. } => ErrorKind::ResolveFailed,
        }
    }
}

impl From<serde_json::Error> for MonitorError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseFailed(err.to_string())
    }
}
