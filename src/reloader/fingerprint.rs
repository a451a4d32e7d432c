//! Classpath fingerprints: did a module's compiled output actually change?
//!
//! Catches outputs rewritten by external tools even when no source change
//! was observed.

use std::path::{Path, PathBuf};

use jwalk::WalkDir;
use rustc_hash::FxHashSet;

use crate::utils::mtime::mtime_millis;

/// Newest output mtime plus the set of output files of one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClasspathFingerprint {
    /// Epoch millis of the newest output file, 0 when there is none.
    pub latest: i64,
    pub files: FxHashSet<PathBuf>,
}

impl ClasspathFingerprint {
    /// Scan `output_dir`. A missing directory yields the empty fingerprint.
    pub fn compute(output_dir: &Path) -> Self {
        let mut fingerprint = Self::default();
        if !output_dir.is_dir() {
            return fingerprint;
        }

        for entry in WalkDir::new(output_dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            if let Some(mtime) = mtime_millis(&path) {
                fingerprint.latest = fingerprint.latest.max(mtime);
            }
            fingerprint.files.insert(path);
        }
        fingerprint
    }

    /// Whether this (newer) fingerprint shows a change over `previous`.
    ///
    /// Changed means a newer latest timestamp, or a different set of files.
    pub fn differs(&self, previous: &Self) -> bool {
        self.latest > previous.latest || self.files != previous.files
    }
}
