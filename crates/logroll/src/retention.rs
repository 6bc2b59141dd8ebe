//! Backup retention.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::SinkError;
use crate::scanner::BackupEntry;

/// How many backups the sink keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Keep every backup.
    Unbounded,
    /// Keep at most this many backups (a count of zero behaves as one).
    Count(usize),
}

impl RetentionPolicy {
    /// Returns the maximum number of backups, if bounded.
    #[must_use]
    pub const fn limit(&self) -> Option<usize> {
        match self {
            Self::Unbounded => None,
            Self::Count(0) => Some(1),
            Self::Count(n) => Some(*n),
        }
    }

    /// Deletes the oldest backups beyond the limit.
    ///
    /// `backups` must be ordered oldest first, as returned by
    /// [`crate::scanner::scan`]. A failed deletion is recorded in the outcome
    /// and the pass moves on to the next entry.
    pub async fn trim(&self, backups: Vec<BackupEntry>) -> TrimOutcome {
        let excess = self
            .limit()
            .map_or(0, |limit| backups.len().saturating_sub(limit));

        let mut outcome = TrimOutcome {
            most_recent: backups.last().map(|b| b.timestamp),
            retained: backups.len(),
            ..TrimOutcome::default()
        };

        for entry in backups.into_iter().take(excess) {
            match tokio::fs::remove_file(&entry.path).await {
                Ok(()) => {
                    debug!(path = %entry.path.display(), "removed old backup");
                    outcome.retained -= 1;
                    outcome.removed.push(entry.path);
                }
                Err(e) => {
                    debug!(path = %entry.path.display(), error = %e, "failed to remove old backup");
                    outcome.errors.push(SinkError::Trim {
                        path: entry.path,
                        source: e,
                    });
                }
            }
        }

        outcome
    }
}

/// Result of a retention pass.
#[derive(Debug, Default)]
pub struct TrimOutcome {
    /// Backups that were deleted, oldest first.
    pub removed: Vec<PathBuf>,
    /// Deletions that failed.
    pub errors: Vec<SinkError>,
    /// Timestamp of the newest remaining backup.
    pub most_recent: Option<DateTime<Utc>>,
    /// Number of backups still on disk.
    pub retained: usize,
}
