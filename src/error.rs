//! Error types for snapshot building, live state, reconciliation, and transport.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors produced by the sync engine.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Stat, read, or hash failure on a single path.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A directory could not be registered with the filesystem watcher.
    #[error("failed to watch directory {path}: {source}")]
    WatchRegistration {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// A path is not rooted under the root it was mapped against.
    #[error("path {path} is not under root {root}")]
    PathMapping { path: PathBuf, root: PathBuf },

    /// A snapshot violates its structural invariants (no root, ambiguous root).
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),

    /// Network or HTTP failure talking to a peer.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        /// Whether the caller may retry the operation.
        retryable: bool,
    },

    /// The wire representation of a snapshot could not be decoded.
    #[error("wire format error: {0}")]
    Wire(String),

    /// A single action failed; remaining actions in the batch were not applied.
    #[error("failed to apply action `{action}`: {source}")]
    Action {
        action: String,
        #[source]
        source: io::Error,
    },

    /// Configuration or logging setup error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn path_mapping(path: impl AsRef<Path>, root: impl AsRef<Path>) -> Self {
        Self::PathMapping {
            path: path.as_ref().to_path_buf(),
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Transport failures flagged retryable; every other kind is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { retryable: true, .. })
    }
}
