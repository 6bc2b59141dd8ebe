//! # logroll
//!
//! Size-based rotating file sink for log pipelines.
//!
//! This crate provides:
//!
//! - [`RotatingSink`] — Serialized writer that rotates the file before it
//!   outgrows its size limit
//! - [`SinkRegistry`] — One sink per file path, shared by all producers
//! - [`SinkConfig`] — Resolved configuration (path, size limit, retain count)
//! - [`namer`] — Backup naming (`app.log.YYYYMMDD[_HHMMSS[_mmm]]`)
//! - [`scanner`] — Discovery of existing backups on disk
//! - [`RetentionPolicy`] / [`TriggerPolicy`] — When to rotate and what to keep
//! - [`SinkObserver`] — Side channel for rotation events and background errors
//!
//! ## Example
//!
//! ```no_run
//! use logroll::{SinkConfig, SinkRegistry};
//!
//! # async fn run() -> logroll::Result<()> {
//! let registry = SinkRegistry::new();
//! let sink = registry
//!     .get_or_open(
//!         SinkConfig::new("/var/log/app.log")
//!             .with_max_size(10 * 1024 * 1024)
//!             .with_retain_count(5),
//!     )
//!     .await?;
//!
//! sink.write("service started\n").await?;
//! registry.close_all().await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod namer;
pub mod observer;
pub mod registry;
pub mod retention;
pub mod scanner;
pub mod sink;
pub mod trigger;

// Re-export main types
pub use config::{parse_byte_size, retain_count_from, SinkConfig, DEFAULT_NAME_PATTERN, DEFAULT_RETAIN_COUNT};
pub use error::{Result, SinkError};
pub use observer::{ChannelObserver, SinkEvent, SinkObserver, TracingObserver};
pub use registry::SinkRegistry;
pub use retention::{RetentionPolicy, TrimOutcome};
pub use scanner::BackupEntry;
pub use sink::{RotatingSink, RotationOutcome, SinkStats};
pub use trigger::{SizeTrigger, TriggerPolicy};
