//! Per-path exclusive locks.
//!
//! Two layers: an in-process table of slots keyed by canonical path (threads),
//! and an optional advisory lock file per key (processes). Keys are
//! canonicalized so that two spellings of one document contend and two
//! different documents never do.

use crate::document::StoreError;
use fs4::FileExt;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

const PROCESS_LOCK_POLL: Duration = Duration::from_millis(10);

// The guarded values are plain flags and maps that are never left half
// updated, so a poisoned mutex is still consistent.
fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Canonical lock key for `path`.
///
/// Canonicalizes the longest existing ancestor and re-appends the remaining
/// components, so a document that does not exist yet maps to the same key it
/// will have once created.
#[must_use]
pub fn canonical_key(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut existing = absolute.as_path();
    let mut rest: Vec<OsString> = Vec::new();
    loop {
        if let Ok(canonical) = fs::canonicalize(existing) {
            return rest
                .iter()
                .rev()
                .fold(canonical, |acc, component| acc.join(component));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_os_string());
                existing = parent;
            }
            _ => return absolute,
        }
    }
}

#[derive(Debug, Default)]
struct Slot {
    held: Mutex<bool>,
    released: Condvar,
}

/// In-process lock table
#[derive(Debug, Default)]
pub struct LockTable {
    slots: Mutex<HashMap<PathBuf, Arc<Slot>>>,
}

impl LockTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held or waited on
    #[must_use]
    pub fn active(&self) -> usize {
        lock_unpoisoned(&self.slots).len()
    }

    /// Block until `key` is free and take it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LockTimeout`] if `timeout` elapses first
    pub fn acquire(&self, key: PathBuf, timeout: Option<Duration>) -> Result<LocalGuard<'_>, StoreError> {
        let slot = {
            let mut slots = lock_unpoisoned(&self.slots);
            Arc::clone(slots.entry(key.clone()).or_default())
        };

        let started = Instant::now();
        let mut held = lock_unpoisoned(&slot.held);
        while *held {
            match timeout {
                None => {
                    held = slot
                        .released
                        .wait(held)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Some(limit) => {
                    let waited = started.elapsed();
                    if waited >= limit {
                        drop(held);
                        self.forget(&key, slot);
                        return Err(StoreError::LockTimeout { path: key, waited });
                    }
                    let (guard, _) = slot
                        .released
                        .wait_timeout(held, limit - waited)
                        .unwrap_or_else(PoisonError::into_inner);
                    held = guard;
                }
            }
        }
        *held = true;
        drop(held);

        Ok(LocalGuard {
            table: self,
            key,
            slot: Some(slot),
        })
    }

    // Drop the table entry once only the table and `slot` reference it.
    fn forget(&self, key: &Path, slot: Arc<Slot>) {
        let mut slots = lock_unpoisoned(&self.slots);
        let unused = slots
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, &slot) && Arc::strong_count(&slot) == 2);
        if unused {
            slots.remove(key);
        }
    }
}

/// Held in-process lock; released on drop
#[derive(Debug)]
pub struct LocalGuard<'a> {
    table: &'a LockTable,
    key: PathBuf,
    slot: Option<Arc<Slot>>,
}

impl LocalGuard<'_> {
    /// Canonical key this guard holds
    #[must_use]
    pub fn key(&self) -> &Path {
        &self.key
    }
}

impl Drop for LocalGuard<'_> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            *lock_unpoisoned(&slot.held) = false;
            slot.released.notify_one();
            self.table.forget(&self.key, slot);
        }
    }
}

/// Lock file used for `key` inside `lock_dir`
#[must_use]
pub fn lock_file_path(lock_dir: &Path, key: &Path) -> PathBuf {
    let digest = blake3::hash(key.as_os_str().as_encoded_bytes());
    lock_dir.join(format!("{}.lock", digest.to_hex()))
}

/// Take the cross-process lock for `key`; released when the file is dropped.
///
/// # Errors
///
/// Returns error if the lock file cannot be opened or locked, or if
/// `timeout` elapses while another process holds it
pub fn acquire_process_lock(
    lock_dir: &Path,
    key: &Path,
    timeout: Option<Duration>,
) -> Result<File, StoreError> {
    fs::create_dir_all(lock_dir).map_err(|source| StoreError::io(lock_dir, source))?;
    let path = lock_file_path(lock_dir, key);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&path)
        .map_err(|source| StoreError::io(&path, source))?;

    let Some(limit) = timeout else {
        file.lock_exclusive()
            .map_err(|source| StoreError::io(&path, source))?;
        return Ok(file);
    };

    let started = Instant::now();
    loop {
        match file.try_lock_exclusive() {
            Ok(()) => return Ok(file),
            Err(err) if err.kind() == ErrorKind::WouldBlock => {
                let waited = started.elapsed();
                if waited >= limit {
                    return Err(StoreError::LockTimeout {
                        path: key.to_path_buf(),
                        waited,
                    });
                }
                std::thread::sleep(PROCESS_LOCK_POLL.min(limit - waited));
            }
            Err(source) => return Err(StoreError::io(&path, source)),
        }
    }
}
