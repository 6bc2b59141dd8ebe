//! Size-based rotation trigger.

use std::path::Path;

use tracing::debug;

/// When the sink rotates on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerPolicy {
    /// Never rotate automatically.
    Never,
    /// Rotate before a write once the file holds at least `max_bytes`.
    Size {
        /// Size threshold in bytes.
        max_bytes: u64,
    },
}

/// Tracks the active file size and answers whether a write must be
/// preceded by a rotation.
///
/// The size starts out unknown. The first check stats the file (a missing
/// file counts as empty); after that the size is maintained from accepted
/// writes and never re-read unless [`SizeTrigger::invalidate`] is called.
#[derive(Debug, Clone)]
pub struct SizeTrigger {
    policy: TriggerPolicy,
    current: Option<u64>,
}

impl SizeTrigger {
    /// Creates a trigger with an unknown current size.
    #[must_use]
    pub const fn new(policy: TriggerPolicy) -> Self {
        Self {
            policy,
            current: None,
        }
    }

    /// Returns the policy this trigger evaluates.
    #[must_use]
    pub const fn policy(&self) -> TriggerPolicy {
        self.policy
    }

    /// Returns the tracked size, if it has been resolved.
    #[must_use]
    pub const fn current_size(&self) -> Option<u64> {
        self.current
    }

    /// Decides whether the next write to `path` must rotate first.
    pub async fn must_rotate(&mut self, path: &Path) -> bool {
        let TriggerPolicy::Size { max_bytes } = self.policy else {
            return false;
        };

        let size = match self.current {
            Some(size) => size,
            None => {
                let size = match tokio::fs::metadata(path).await {
                    Ok(meta) => meta.len(),
                    Err(e) => {
                        debug!(path = %path.display(), error = %e, "stat failed, assuming empty file");
                        0
                    }
                };
                self.current = Some(size);
                size
            }
        };

        size >= max_bytes
    }

    /// Accounts for an accepted write of `len` bytes.
    pub fn record_write(&mut self, len: u64) {
        if matches!(self.policy, TriggerPolicy::Never) {
            return;
        }
        if let Some(size) = self.current.as_mut() {
            *size = size.saturating_add(len);
        }
    }

    /// Marks the active file as freshly created.
    pub fn reset(&mut self) {
        if !matches!(self.policy, TriggerPolicy::Never) {
            self.current = Some(0);
        }
    }

    /// Forgets the tracked size so the next check stats the file again.
    pub fn invalidate(&mut self) {
        self.current = None;
    }
}
