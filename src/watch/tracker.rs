//! Pending change set shared between the watch thread and the reload loop.
//!
//! The watch thread reports `(path, mtime)` pairs; the reload loop drains the
//! pending set once per build attempt and restores it if the build fails.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// Path → last observed modification time (epoch millis).
pub type ChangeSet = FxHashMap<PathBuf, i64>;

/// Coalesces file notifications into a pending change set.
///
/// # Invariants
/// - A pending path always carries its most recent observed timestamp
/// - A notification repeating the last observed timestamp is a no-op
#[derive(Debug, Default)]
pub struct FileChangeTracker {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    /// Last timestamp observed per path, kept across drains.
    observed: FxHashMap<PathBuf, i64>,
    /// Changes not yet consumed by a build.
    pending: ChangeSet,
}

impl FileChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a notification. Returns `true` if it produced a pending change.
    pub fn on_change(&self, path: &Path, timestamp: i64) -> bool {
        let mut inner = self.inner.lock();
        if inner.observed.get(path) == Some(&timestamp) {
            return false;
        }
        inner.observed.insert(path.to_path_buf(), timestamp);
        inner.pending.insert(path.to_path_buf(), timestamp);
        true
    }

    /// Take the pending set, leaving an empty one behind.
    pub fn drain_pending(&self) -> ChangeSet {
        std::mem::take(&mut self.inner.lock().pending)
    }

    /// Merge a previously drained set back in.
    ///
    /// A path that changed again since the drain keeps its newer timestamp.
    pub fn restore(&self, changes: ChangeSet) {
        let mut inner = self.inner.lock();
        for (path, timestamp) in changes {
            inner.pending.entry(path).or_insert(timestamp);
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.inner.lock().pending.is_empty()
    }

    #[cfg(test)]
    pub fn pending_len(&self) -> usize {
        self.inner.lock().pending.len()
    }
}
