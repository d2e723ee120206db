//! Store configuration.

use crate::document::StoreError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Application base directory; the managed tree lives under `root/tools`
    pub root: PathBuf,
    /// Upper bound on waiting for a document lock (None = wait indefinitely)
    pub lock_timeout_ms: Option<u64>,
    /// Also take an OS advisory lock so separate processes serialize
    pub process_locks: bool,
    /// Pretty-print documents (two-space indent)
    pub pretty: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            lock_timeout_ms: None,
            process_locks: true,
            pretty: true,
        }
    }
}

impl StoreConfig {
    /// Default configuration rooted at `root`
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Set the lock timeout
    #[must_use]
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Enable or disable cross-process locks
    #[must_use]
    pub fn with_process_locks(mut self, enabled: bool) -> Self {
        self.process_locks = enabled;
        self
    }

    /// Lock timeout as a duration
    #[must_use]
    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }

    /// Load configuration from a JSON file; absent keys take their defaults
    ///
    /// # Errors
    ///
    /// Returns error if the file is missing, unreadable, or not valid JSON
    pub fn from_json_file(path: &Path) -> Result<Self, StoreError> {
        let bytes = std::fs::read(path).map_err(|source| StoreError::from_io(path, source))?;
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
