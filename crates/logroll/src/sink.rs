//! The rotating file sink.
//!
//! A [`RotatingSink`] is a cheap, cloneable handle to a worker task that owns
//! the open file. Every request (write, rotate, flush, close) goes through one
//! queue and is processed in submission order, so a write can never touch a
//! handle that is being closed or renamed:
//!
//! ```text
//!  producers ──► queue ──► worker: Open ──trigger──► Rotating ──► Open
//!                                   │                 close, rename,
//!                                   └─ write          reopen, rescan, trim
//! ```
//!
//! The write that triggers a rotation is held by the worker while the
//! sequence runs and is applied to the fresh file afterwards. Requests that
//! arrive in the meantime wait in the queue in the order they were sent.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use crate::config::SinkConfig;
use crate::error::{Result, SinkError};
use crate::namer;
use crate::observer::{SinkEvent, SinkObserver, TracingObserver};
use crate::retention::{RetentionPolicy, TrimOutcome};
use crate::scanner;
use crate::trigger::{SizeTrigger, TriggerPolicy};

/// Capacity of the request queue in front of the worker.
const QUEUE_CAPACITY: usize = 1024;

/// How many alternative names a rotation tries before giving up.
const COLLISION_RETRIES: u32 = 5;

/// What a rotation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationOutcome {
    /// True if the active file was renamed to a backup.
    pub rotated: bool,
    /// The backup the active file was renamed to.
    pub backup_path: Option<PathBuf>,
    /// Old backups deleted by the retention pass that followed.
    pub removed: Vec<PathBuf>,
}

/// Point-in-time statistics for a sink.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkStats {
    /// Size of the active file as tracked by the trigger, if known.
    pub current_size: Option<u64>,
    /// Total bytes accepted.
    pub bytes_written: u64,
    /// Number of accepted writes.
    pub writes: u64,
    /// Number of successful rotations.
    pub rotations: u64,
    /// Most recent backup created by this sink.
    pub last_backup: Option<PathBuf>,
    /// Timestamp the backup namer will compare the next rotation against.
    pub last_rotation: Option<DateTime<Utc>>,
}

enum Request {
    Write {
        data: Vec<u8>,
        reply: oneshot::Sender<Result<()>>,
    },
    Rotate {
        reply: oneshot::Sender<RotationOutcome>,
    },
    Flush {
        reply: oneshot::Sender<Result<()>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a rotating file sink.
///
/// Clones share the same worker and file. Dropping every handle closes the
/// file once queued requests have been processed.
#[derive(Clone)]
pub struct RotatingSink {
    config: Arc<SinkConfig>,
    requests: mpsc::Sender<Request>,
    stats: Arc<RwLock<SinkStats>>,
}

impl std::fmt::Debug for RotatingSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotatingSink")
            .field("path", &self.config.path)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl RotatingSink {
    /// Opens a sink that reports background events through `tracing`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Configuration`] for an invalid config and
    /// [`SinkError::Stream`] if the log file cannot be opened.
    pub async fn open(config: SinkConfig) -> Result<Self> {
        Self::open_with_observer(config, Arc::new(TracingObserver)).await
    }

    /// Opens a sink that reports background events to `observer`.
    ///
    /// When size-triggered rotation is enabled, existing backups are scanned
    /// and trimmed to the retain count before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Configuration`] for an invalid config and
    /// [`SinkError::Stream`] if the log file cannot be opened.
    pub async fn open_with_observer(
        config: SinkConfig,
        observer: Arc<dyn SinkObserver>,
    ) -> Result<Self> {
        config.validate()?;
        let (backup_dir, prefix) = scanner::split_base(&config.path)?;

        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| SinkError::Stream {
                        path: config.path.clone(),
                        source,
                    })?;
            }
        }

        let file = open_append(&config.path)
            .await
            .map_err(|source| SinkError::Stream {
                path: config.path.clone(),
                source,
            })?;

        let trigger = config.trigger_policy();
        let retention = config.retention_policy();

        let mut worker = SinkWorker {
            path: config.path.clone(),
            backup_dir,
            prefix,
            file: Some(file),
            phase: Phase::Open,
            trigger: SizeTrigger::new(trigger),
            retention,
            last_rotation: None,
            observer,
            stats: Arc::new(RwLock::new(SinkStats::default())),
        };

        if matches!(trigger, TriggerPolicy::Size { .. }) && retention.limit().is_some() {
            let trim = worker.reconcile().await;
            debug!(
                path = %config.path.display(),
                retained = trim.retained,
                removed = trim.removed.len(),
                "reconciled existing backups"
            );
        }
        debug!(
            path = %config.path.display(),
            max_size = config.max_size,
            retention = ?retention,
            "opened rotating sink"
        );
        Ok(Self::spawn(config, worker))
    }

    fn spawn(config: SinkConfig, worker: SinkWorker) -> Self {
        worker.publish_stats();
        let stats = Arc::clone(&worker.stats);
        let (requests, rx) = mpsc::channel(QUEUE_CAPACITY);
        tokio::spawn(worker.run(rx));

        Self {
            config: Arc::new(config),
            requests,
            stats,
        }
    }

    /// Returns the path of the active file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Returns the configuration the sink was opened with.
    #[must_use]
    pub fn config(&self) -> &SinkConfig {
        &self.config
    }

    /// Returns true once the worker has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.requests.is_closed()
    }

    /// Returns a snapshot of the sink's statistics.
    #[must_use]
    pub fn stats(&self) -> SinkStats {
        self.stats.read().clone()
    }

    /// Appends `data` to the active file, rotating first if the size limit
    /// has been reached.
    ///
    /// Completes once the bytes have been handed to the operating system.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Stream`] if this write could not be applied and
    /// [`SinkError::Closed`] if the sink has been closed. Rotation problems
    /// are never returned here; they go to the observer.
    pub async fn write(&self, data: impl Into<Vec<u8>>) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Write {
            data: data.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| SinkError::Closed)?
    }

    /// Rotates the active file now, regardless of its size.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Closed`] if the sink has been closed. A failed
    /// rotation is reported to the observer and shows up as an outcome with
    /// `rotated == false`.
    pub async fn rotate(&self) -> Result<RotationOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Rotate { reply }).await?;
        rx.await.map_err(|_| SinkError::Closed)
    }

    /// Waits until every previously queued write has reached the file.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Stream`] if flushing fails and
    /// [`SinkError::Closed`] if the sink has been closed.
    pub async fn flush(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Flush { reply }).await?;
        rx.await.map_err(|_| SinkError::Closed)?
    }

    /// Processes queued requests, closes the file and stops the worker.
    ///
    /// Later requests on any clone fail with [`SinkError::Closed`]. Closing
    /// an already closed sink is a no-op.
    pub async fn close(&self) {
        let (reply, rx) = oneshot::channel();
        if self.send(Request::Close { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }

    async fn send(&self, request: Request) -> Result<()> {
        self.requests
            .send(request)
            .await
            .map_err(|_| SinkError::Closed)
    }
}

async fn open_append(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path).await
}

/// Worker phase. Writes are only ever applied in `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Open,
    Rotating,
}

struct SinkWorker {
    path: PathBuf,
    backup_dir: PathBuf,
    prefix: String,
    /// `None` after a failed (re)open; the next write tries again.
    file: Option<File>,
    phase: Phase,
    trigger: SizeTrigger,
    retention: RetentionPolicy,
    last_rotation: Option<DateTime<Utc>>,
    observer: Arc<dyn SinkObserver>,
    stats: Arc<RwLock<SinkStats>>,
}

impl SinkWorker {
    async fn run(mut self, mut rx: mpsc::Receiver<Request>) {
        while let Some(request) = rx.recv().await {
            match request {
                Request::Write { data, reply } => {
                    let result = self.handle_write(&data).await;
                    let _ = reply.send(result);
                }
                Request::Rotate { reply } => {
                    let outcome = self.rotate().await;
                    let _ = reply.send(outcome);
                }
                Request::Flush { reply } => {
                    let _ = reply.send(self.flush().await);
                }
                Request::Close { reply } => {
                    rx.close();
                    self.shutdown().await;
                    let _ = reply.send(());
                    // Requests that raced with the close are answered with `Closed`.
                    while let Some(request) = rx.recv().await {
                        reject(request);
                    }
                    return;
                }
            }
        }
        self.shutdown().await;
    }

    async fn handle_write(&mut self, data: &[u8]) -> Result<()> {
        if self.trigger.must_rotate(&self.path).await {
            trace!(path = %self.path.display(), "size limit reached, rotating before write");
            self.rotate().await;
        }
        self.write_through(data).await
    }

    async fn write_through(&mut self, data: &[u8]) -> Result<()> {
        debug_assert_eq!(self.phase, Phase::Open);

        let mut file = match self.file.take() {
            Some(file) => file,
            None => open_append(&self.path)
                .await
                .map_err(|source| self.stream_error(source))?,
        };

        let written = async {
            file.write_all(data).await?;
            file.flush().await
        }
        .await;

        match written {
            Ok(()) => {
                self.file = Some(file);
                let len = data.len() as u64;
                self.trigger.record_write(len);
                {
                    let mut stats = self.stats.write();
                    stats.bytes_written += len;
                    stats.writes += 1;
                    stats.current_size = self.trigger.current_size();
                }
                Ok(())
            }
            // The handle is dropped so the next write reopens the file.
            Err(source) => Err(self.stream_error(source)),
        }
    }

    async fn flush(&mut self) -> Result<()> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        match file.flush().await {
            Ok(()) => Ok(()),
            Err(source) => Err(self.stream_error(source)),
        }
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.flush().await {
            debug!(path = %self.path.display(), error = %e, "flush on close failed");
        }
        self.file = None;
        debug!(path = %self.path.display(), "closed rotating sink");
    }

    /// Close, rename, reopen, rescan, trim.
    async fn rotate(&mut self) -> RotationOutcome {
        self.phase = Phase::Rotating;
        let mut outcome = RotationOutcome::default();

        if let Some(mut file) = self.file.take() {
            if let Err(source) = file.flush().await {
                let error = self.stream_error(source);
                trace!(error = %error, "flush before rotation failed");
            }
        }

        match self.rename_to_backup().await {
            Ok((backup, now)) => {
                debug!(path = %self.path.display(), backup = %backup.display(), "renamed log file");
                self.last_rotation = Some(now);
                self.trigger.reset();
                outcome.rotated = true;
                outcome.backup_path = Some(backup);
            }
            Err(source) => {
                self.report(SinkError::Rotation {
                    path: self.path.clone(),
                    source,
                });
                self.trigger.invalidate();
            }
        }

        match open_append(&self.path).await {
            Ok(file) => self.file = Some(file),
            Err(source) => self.report(SinkError::Rotation {
                path: self.path.clone(),
                source,
            }),
        }

        if outcome.rotated {
            outcome.removed = self.reconcile().await.removed;
            let mut stats = self.stats.write();
            stats.rotations += 1;
            stats.last_backup.clone_from(&outcome.backup_path);
        }

        self.phase = Phase::Open;
        self.publish_stats();
        self.observer.on_event(&SinkEvent::Rotated {
            path: self.path.clone(),
            outcome: outcome.clone(),
        });
        outcome
    }

    /// Renames the active file to its backup name and returns the backup
    /// path with the rotation time it encodes.
    ///
    /// A taken name is never overwritten: the fully qualified `_HHMMSS_mmm`
    /// form is tried instead, waiting for the next millisecond if needed.
    async fn rename_to_backup(&self) -> std::io::Result<(PathBuf, DateTime<Utc>)> {
        let mut now = Utc::now();
        let mut backup = namer::backup_path(&self.path, now, self.last_rotation);

        let mut attempts = 0;
        while tokio::fs::try_exists(&backup).await? {
            attempts += 1;
            if attempts > COLLISION_RETRIES {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    format!("backup {} already exists", backup.display()),
                ));
            }
            if attempts > 1 {
                tokio::time::sleep(Duration::from_millis(1)).await;
                now = Utc::now();
            }
            backup = namer::backup_path(&self.path, now, Some(now));
        }

        tokio::fs::rename(&self.path, &backup).await?;
        Ok((backup, now))
    }

    /// Rescans the backup set and applies retention.
    async fn reconcile(&mut self) -> TrimOutcome {
        let backups = match scanner::scan(&self.backup_dir, &self.prefix).await {
            Ok(backups) => backups,
            Err(e) => {
                self.report(e);
                Vec::new()
            }
        };

        let mut trim = self.retention.trim(backups).await;
        for error in std::mem::take(&mut trim.errors) {
            self.report(error);
        }
        if let Some(most_recent) = trim.most_recent {
            self.last_rotation = Some(most_recent);
        }
        trim
    }

    fn publish_stats(&self) {
        let mut stats = self.stats.write();
        stats.current_size = self.trigger.current_size();
        stats.last_rotation = self.last_rotation;
    }

    fn stream_error(&self, source: std::io::Error) -> SinkError {
        let reported = SinkError::Stream {
            path: self.path.clone(),
            source: std::io::Error::new(source.kind(), source.to_string()),
        };
        self.report(reported);
        SinkError::Stream {
            path: self.path.clone(),
            source,
        }
    }

    fn report(&self, error: SinkError) {
        self.observer.on_event(&SinkEvent::Failed {
            path: self.path.clone(),
            error: Arc::new(error),
        });
    }
}

fn reject(request: Request) {
    match request {
        Request::Write { reply, .. } | Request::Flush { reply } => {
            let _ = reply.send(Err(SinkError::Closed));
        }
        Request::Rotate { reply } => drop(reply),
        Request::Close { reply } => {
            let _ = reply.send(());
        }
    }
}
