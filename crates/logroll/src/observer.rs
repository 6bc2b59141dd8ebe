//! Side channel for rotation events and background errors.
//!
//! Writes only ever return their own success or failure. Everything else a
//! sink does in the background (rotations, trims, failed renames, failed
//! scans) is delivered to a [`SinkObserver`].

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::SinkError;
use crate::sink::RotationOutcome;

/// Something that happened inside a sink.
#[derive(Debug, Clone)]
pub enum SinkEvent {
    /// A rotation sequence finished.
    Rotated {
        /// The active file path.
        path: PathBuf,
        /// What the rotation did.
        outcome: RotationOutcome,
    },
    /// A background operation failed.
    Failed {
        /// The active file path.
        path: PathBuf,
        /// The error.
        error: Arc<SinkError>,
    },
}

impl SinkEvent {
    /// Returns the active file path the event belongs to.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Rotated { path, .. } | Self::Failed { path, .. } => path,
        }
    }

    /// Returns the error carried by a [`SinkEvent::Failed`] event.
    #[must_use]
    pub fn error(&self) -> Option<&SinkError> {
        match self {
            Self::Failed { error, .. } => Some(error.as_ref()),
            Self::Rotated { .. } => None,
        }
    }
}

/// Receives sink events.
///
/// Called from the sink's worker task; implementations must not block.
pub trait SinkObserver: Send + Sync {
    /// Handles one event.
    fn on_event(&self, event: &SinkEvent);
}

/// Observer that logs every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl SinkObserver for TracingObserver {
    fn on_event(&self, event: &SinkEvent) {
        match event {
            SinkEvent::Rotated { path, outcome } => {
                if let Some(backup) = &outcome.backup_path {
                    info!(
                        path = %path.display(),
                        backup = %backup.display(),
                        removed = outcome.removed.len(),
                        "rotated log file"
                    );
                }
            }
            SinkEvent::Failed { path, error } => {
                warn!(path = %path.display(), error = %error, "log sink error");
            }
        }
    }
}

/// Observer that forwards events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<SinkEvent>,
}

impl ChannelObserver {
    /// Creates the observer and the receiving end of its channel.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl SinkObserver for ChannelObserver {
    fn on_event(&self, event: &SinkEvent) {
        // Nobody listening is fine.
        let _ = self.tx.send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed_event() -> SinkEvent {
        SinkEvent::Failed {
            path: PathBuf::from("app.log"),
            error: Arc::new(SinkError::Closed),
        }
    }

    #[test]
    fn event_accessors() {
        let event = failed_event();
        assert_eq!(event.path(), std::path::Path::new("app.log"));
        assert!(matches!(event.error(), Some(SinkError::Closed)));

        let event = SinkEvent::Rotated {
            path: PathBuf::from("app.log"),
            outcome: RotationOutcome::default(),
        };
        assert!(event.error().is_none());
    }

    #[test]
    fn channel_observer_forwards() {
        let (observer, mut rx) = ChannelObserver::channel();
        observer.on_event(&failed_event());

        let received = rx.try_recv().expect("event delivered");
        assert!(matches!(received, SinkEvent::Failed { .. }));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn channel_observer_tolerates_dropped_receiver() {
        let (observer, rx) = ChannelObserver::channel();
        drop(rx);
        observer.on_event(&failed_event());
    }

    #[test]
    fn observers_are_object_safe() {
        let observers: Vec<Arc<dyn SinkObserver>> = vec![
            Arc::new(TracingObserver),
            Arc::new(ChannelObserver::channel().0),
        ];
        for observer in observers {
            observer.on_event(&failed_event());
        }
    }
}
