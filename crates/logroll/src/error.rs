//! Error types for the rotating sink.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while writing to, rotating, or reconciling a sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink configuration is unusable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Opening, writing to, or flushing the active file failed.
    #[error("stream error on {path}: {source}")]
    Stream {
        /// The active file path.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// Renaming the active file or reopening it after a rename failed.
    #[error("rotation of {path} failed: {source}")]
    Rotation {
        /// The active file path.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// Listing the backup directory failed.
    #[error("failed to scan {dir}: {source}")]
    Scan {
        /// The directory that could not be listed.
        dir: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// Deleting a single backup file failed.
    #[error("failed to remove backup {path}: {source}")]
    Trim {
        /// The backup that could not be removed.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The sink worker has shut down.
    #[error("sink closed")]
    Closed,
}

impl SinkError {
    /// Returns true for errors that are reported through the observer only
    /// and never returned from a write.
    #[must_use]
    pub const fn is_background(&self) -> bool {
        matches!(self, Self::Rotation { .. } | Self::Scan { .. } | Self::Trim { .. })
    }
}

/// Result type alias for sink operations.
pub type Result<T> = std::result::Result<T, SinkError>;
