//! Typed, atomic access to single JSON documents.
//!
//! Writes go to a temporary file in the destination directory and are renamed
//! over the destination, so a reader sees either the old or the new complete
//! document. Read-modify-write sequences must run under [`ConfigStore::lock`]
//! (or [`ConfigStore::with_lock`]) for the document they touch.

use crate::config::StoreConfig;
use crate::layout::Layout;
use crate::lock::{LocalGuard, LockTable, acquire_process_lock, canonical_key};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Store error
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Document does not exist
    #[error("Document not found: {}", path.display())]
    NotFound {
        /// Document path
        path: PathBuf,
    },

    /// Document exists but is not valid for the expected shape
    #[error("Parse error in {}: {source}", path.display())]
    Parse {
        /// Document path
        path: PathBuf,
        /// Decoder error
        source: serde_json::Error,
    },

    /// Document could not be encoded
    #[error("Encode error for {}: {source}", path.display())]
    Encode {
        /// Document path
        path: PathBuf,
        /// Encoder error
        source: serde_json::Error,
    },

    /// Filesystem failure
    #[error("IO error on {}: {source}", path.display())]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Lock not acquired within the configured bound
    #[error("Timed out after {waited:?} waiting for lock on {}", path.display())]
    LockTimeout {
        /// Canonical lock key
        path: PathBuf,
        /// Time spent waiting
        waited: Duration,
    },
}

impl StoreError {
    /// Wrap an I/O error
    #[must_use]
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Wrap an I/O error from a read, mapping a missing file to `NotFound`
    #[must_use]
    pub fn from_io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == ErrorKind::NotFound {
            Self::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            Self::io(path, source)
        }
    }

    /// Check if this is a missing document
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Exclusive hold on one document; released on drop
#[derive(Debug)]
pub struct DocumentLock<'a> {
    // Field order is drop order: the process lock goes first.
    process: Option<File>,
    local: LocalGuard<'a>,
}

impl DocumentLock<'_> {
    /// Canonical key of the locked document
    #[must_use]
    pub fn key(&self) -> &Path {
        self.local.key()
    }

    /// Whether a cross-process lock is also held
    #[must_use]
    pub fn is_process_wide(&self) -> bool {
        self.process.is_some()
    }
}

/// Durable, race-safe read/write of JSON documents
#[derive(Debug)]
pub struct ConfigStore {
    locks: LockTable,
    lock_dir: Option<PathBuf>,
    lock_timeout: Option<Duration>,
    pretty: bool,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore {
    /// In-process locking only, no timeout, pretty output
    #[must_use]
    pub fn new() -> Self {
        Self {
            locks: LockTable::new(),
            lock_dir: None,
            lock_timeout: None,
            pretty: true,
        }
    }

    /// Build from configuration; process locks live under the layout's lock dir
    #[must_use]
    pub fn from_config(config: &StoreConfig, layout: &Layout) -> Self {
        Self {
            locks: LockTable::new(),
            lock_dir: config.process_locks.then(|| layout.locks_dir()),
            lock_timeout: config.lock_timeout(),
            pretty: config.pretty,
        }
    }

    /// Also take advisory lock files in `dir`
    #[must_use]
    pub fn with_lock_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.lock_dir = Some(dir.into());
        self
    }

    /// Bound lock waits
    #[must_use]
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    /// Toggle pretty output
    #[must_use]
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Load and decode the document at `path`.
    ///
    /// # Errors
    ///
    /// `NotFound` if the file is missing, `Parse` if it does not decode,
    /// `Io` for any other read failure
    pub fn read<T: DeserializeOwned>(&self, path: &Path) -> Result<T, StoreError> {
        let bytes = fs::read(path).map_err(|source| StoreError::from_io(path, source))?;
        let document = serde_json::from_slice(&bytes).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), bytes = bytes.len(), "document read");
        Ok(document)
    }

    /// Like [`ConfigStore::read`], with a missing file read as `T::default()`.
    ///
    /// # Errors
    ///
    /// Returns `Parse` and `Io` failures unchanged
    pub fn read_or_default<T: DeserializeOwned + Default>(&self, path: &Path) -> Result<T, StoreError> {
        match self.read(path) {
            Err(StoreError::NotFound { .. }) => Ok(T::default()),
            other => other,
        }
    }

    /// Encode and atomically replace the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns error if encoding fails or the file cannot be written
    pub fn write<T: Serialize>(&self, path: &Path, document: &T) -> Result<(), StoreError> {
        let encoded = if self.pretty {
            serde_json::to_vec_pretty(document)
        } else {
            serde_json::to_vec(document)
        }
        .map_err(|source| StoreError::Encode {
            path: path.to_path_buf(),
            source,
        })?;
        self.write_bytes(path, &encoded)
    }

    /// Atomically replace `path` with `bytes`.
    ///
    /// The parent directory must exist. Existing permissions are kept; new
    /// files get `0644` on Unix.
    ///
    /// # Errors
    ///
    /// Returns error if the temporary file cannot be written or renamed
    pub fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut temp = NamedTempFile::new_in(parent).map_err(|source| StoreError::io(path, source))?;
        temp.write_all(bytes)
            .map_err(|source| StoreError::io(temp.path(), source))?;
        set_permissions(path, temp.as_file())?;
        temp.as_file()
            .sync_all()
            .map_err(|source| StoreError::io(temp.path(), source))?;
        temp.persist(path)
            .map_err(|err| StoreError::io(path, err.error))?;
        let dir_synced = sync_dir(parent);

        debug!(path = %path.display(), bytes = bytes.len(), dir_synced, "document written");
        Ok(())
    }

    /// Take the exclusive lock for the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns `LockTimeout` if a timeout is configured and elapses, or `Io`
    /// if the lock file cannot be used
    pub fn lock(&self, path: &Path) -> Result<DocumentLock<'_>, StoreError> {
        let key = canonical_key(path);
        let started = Instant::now();
        let local = self.locks.acquire(key, self.lock_timeout)?;
        let process = match &self.lock_dir {
            Some(dir) => {
                let remaining = self
                    .lock_timeout
                    .map(|limit| limit.saturating_sub(started.elapsed()));
                Some(acquire_process_lock(dir, local.key(), remaining)?)
            }
            None => None,
        };
        debug!(
            path = %local.key().display(),
            waited_us = started.elapsed().as_micros() as u64,
            "document lock acquired"
        );
        Ok(DocumentLock { process, local })
    }

    /// Run `f` while holding the lock for `path`; the lock is released on
    /// every exit path, including errors and panics.
    ///
    /// # Errors
    ///
    /// Returns the lock error, or whatever `f` returns
    pub fn with_lock<R, E>(&self, path: &Path, f: impl FnOnce() -> Result<R, E>) -> Result<R, E>
    where
        E: From<StoreError>,
    {
        let _lock = self.lock(path)?;
        f()
    }
}

#[cfg(unix)]
fn set_permissions(target: &Path, file: &File) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    let mode = fs::metadata(target)
        .map(|meta| meta.permissions().mode() & 0o7777)
        .unwrap_or(0o644);
    file.set_permissions(fs::Permissions::from_mode(mode))
        .map_err(|source| StoreError::io(target, source))
}

#[cfg(not(unix))]
fn set_permissions(_target: &Path, _file: &File) -> Result<(), StoreError> {
    Ok(())
}

// Best effort: the rename is already durable on most filesystems, so a
// failed directory fsync is logged and the write still succeeds.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> bool {
    match File::open(dir).and_then(|handle| handle.sync_all()) {
        Ok(()) => true,
        Err(err) => {
            warn!(path = %dir.display(), error = %err, "directory fsync failed after rename");
            false
        }
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> bool {
    true
}
