//! In-process registry of open durable stores
//!
//! At most one handle per store file per process. Paths are canonicalized
//! (through their parent directory, since the file may not exist yet) so two
//! spellings of the same location collide.

use crate::errors::{already_open, io_error, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock};

static OPEN_STORES: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();

fn open_stores() -> MutexGuard<'static, HashSet<PathBuf>> {
    OPEN_STORES
        .get_or_init(|| Mutex::new(HashSet::new()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Canonical registry key for a store path whose parent directory exists
pub fn canonical_key(path: &Path) -> Result<PathBuf> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let parent = parent
        .canonicalize()
        .map_err(|e| io_error("canonicalize", e).with_locator(path.display().to_string()))?;
    match path.file_name() {
        Some(name) => Ok(parent.join(name)),
        None => Ok(parent),
    }
}

/// Exclusive claim on a store path, released on drop
#[derive(Debug)]
pub struct LocatorLease {
    key: PathBuf,
}

impl LocatorLease {
    /// # Errors
    /// `AlreadyOpen` when another lease holds the same canonical path;
    /// `Io` when the parent directory cannot be resolved.
    pub fn acquire(path: &Path) -> Result<Self> {
        let key = canonical_key(path)?;
        let mut stores = open_stores();
        if !stores.insert(key.clone()) {
            return Err(already_open(&path.display().to_string()));
        }
        tracing::debug!(path = %key.display(), "store lease acquired");
        Ok(Self { key })
    }

    pub fn key(&self) -> &Path {
        &self.key
    }
}

impl Drop for LocatorLease {
    fn drop(&mut self) {
        open_stores().remove(&self.key);
        tracing::debug!(path = %self.key.display(), "store lease released");
    }
}

/// Whether a lease currently holds `path`
pub fn is_leased(path: &Path) -> bool {
    canonical_key(path)
        .map(|key| open_stores().contains(&key))
        .unwrap_or(false)
}
