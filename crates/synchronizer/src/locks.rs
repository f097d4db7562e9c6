//! Per-repository serialisation of deploy attempts.
//!
//! Two overlapping deliveries must never interleave git operations on the same
//! working copy. [`RepoLocks`] hands out one async mutex per repository path;
//! the synchronizer holds it from `open` through the CI script copy.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;

/// Path-keyed set of async mutexes.
///
/// Clones share the underlying table.
#[derive(Debug, Clone, Default)]
pub struct RepoLocks {
    table: Arc<Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>>,
}

impl RepoLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other holder has `path` locked and returns a guard that
    /// releases it on drop.
    ///
    /// Paths are compared as given; callers pass the configured repository
    /// path unchanged.
    pub async fn lock(&self, path: &Path) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(table.entry(path.to_path_buf()).or_default())
        };
        mutex.lock_owned().await
    }
}
