//! Registry of open sinks keyed by file path.
//!
//! Two sinks writing to the same file would interleave and rotate over each
//! other, so every producer that wants a sink for a path should get it from
//! one [`SinkRegistry`]. Lookup-or-create is atomic: the registry lock is
//! held while a new sink opens.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::config::SinkConfig;
use crate::error::Result;
use crate::observer::{SinkObserver, TracingObserver};
use crate::sink::RotatingSink;

/// Owns at most one [`RotatingSink`] per file path.
pub struct SinkRegistry {
    sinks: Mutex<HashMap<PathBuf, RotatingSink>>,
    observer: Arc<dyn SinkObserver>,
}

impl Default for SinkRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SinkRegistry {
    /// Creates an empty registry whose sinks log events through `tracing`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_observer(Arc::new(TracingObserver))
    }

    /// Creates an empty registry whose sinks report to `observer`.
    #[must_use]
    pub fn with_observer(observer: Arc<dyn SinkObserver>) -> Self {
        Self {
            sinks: Mutex::new(HashMap::new()),
            observer,
        }
    }

    /// Returns the sink for `config.path`, opening it if needed.
    ///
    /// If a sink for the path is already open it is returned as is and the
    /// rest of `config` is ignored.
    ///
    /// The registry lock is held while a new sink opens, including its
    /// startup scan and trim of existing backups. Lookups for other paths
    /// wait until that finishes.
    ///
    /// # Errors
    ///
    /// Returns the error from [`RotatingSink::open_with_observer`] when a new
    /// sink cannot be opened.
    pub async fn get_or_open(&self, config: SinkConfig) -> Result<RotatingSink> {
        config.validate()?;
        let key = registry_key(&config.path);
        let mut sinks = self.sinks.lock().await;

        if let Some(existing) = sinks.get(&key) {
            if !existing.is_closed() {
                if existing.config() != &config {
                    debug!(path = %key.display(), "sink already open, ignoring new settings");
                }
                return Ok(existing.clone());
            }
            debug!(path = %key.display(), "replacing closed sink");
        }

        let sink = RotatingSink::open_with_observer(config, Arc::clone(&self.observer)).await?;
        sinks.insert(key, sink.clone());
        Ok(sink)
    }

    /// Returns the open sink for `path`, if any.
    pub async fn get(&self, path: &Path) -> Option<RotatingSink> {
        let key = registry_key(path);
        self.sinks
            .lock()
            .await
            .get(&key)
            .filter(|sink| !sink.is_closed())
            .cloned()
    }

    /// Closes the sink for `path` and removes it from the registry.
    ///
    /// Returns false if no sink was registered for the path.
    pub async fn release(&self, path: &Path) -> bool {
        let key = registry_key(path);
        let removed = self.sinks.lock().await.remove(&key);
        match removed {
            Some(sink) => {
                sink.close().await;
                debug!(path = %key.display(), "released sink");
                true
            }
            None => false,
        }
    }

    /// Closes every sink and empties the registry.
    pub async fn close_all(&self) {
        let drained: Vec<RotatingSink> = self.sinks.lock().await.drain().map(|(_, s)| s).collect();
        for sink in drained {
            sink.close().await;
        }
    }

    /// Returns the number of registered sinks.
    pub async fn len(&self) -> usize {
        self.sinks.lock().await.len()
    }

    /// Returns true if no sinks are registered.
    pub async fn is_empty(&self) -> bool {
        self.sinks.lock().await.is_empty()
    }
}

/// Normalizes a path so that `a.log` and `./a.log` share a key.
fn registry_key(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    absolute.components().collect()
}
