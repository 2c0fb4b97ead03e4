//! Staleness checks and bookkeeping for the transform cache.
//!
//! # Design
//!
//! The cache is the destination directory itself: there is no manifest. A
//! destination is fresh only when it exists and its modification time is
//! strictly newer than the source's. Equal timestamps count as stale, so a
//! filesystem with coarse mtime resolution rebuilds rather than serving an
//! artifact that may predate the source.
//!
//! No pixel data is hashed. Touching a source without changing it forces a
//! rebuild; that trade is accepted for a check that costs two `stat` calls.
//!
//! Artifacts are never deleted here. The cache only grows; housekeeping is
//! left to whoever owns the site root.
//!
//! ## Concurrency
//!
//! Batch runs resolve many requests in parallel. Two requests for the same
//! cache key share a destination path, so the facade takes a
//! [`DestinationLocks`] guard around check-then-produce: the second caller
//! waits, then sees a fresh artifact and skips the work.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Whether `dest` must be (re)built from `src`.
///
/// True when `dest` does not exist or is not strictly newer than `src`.
pub fn must_create(src: &Path, dest: &Path) -> io::Result<bool> {
    let dest_modified = match std::fs::metadata(dest) {
        Ok(meta) => meta.modified()?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e),
    };
    let src_modified = std::fs::metadata(src)?.modified()?;
    Ok(dest_modified <= src_modified)
}

/// One mutex per destination path, created on first use.
///
/// Entries are never removed; a build touches a bounded set of artifacts.
#[derive(Debug, Default)]
pub struct DestinationLocks {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl DestinationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `dest`.
    pub fn with_lock<T>(&self, dest: &Path, f: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(dest);
        let _guard: MutexGuard<'_, ()> = lock.lock().unwrap_or_else(|e| e.into_inner());
        f()
    }

    fn lock_for(&self, dest: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(dest.to_path_buf()).or_default().clone()
    }
}

/// Summary of cache behaviour for a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} generated ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} generated", self.misses)
        }
    }
}
