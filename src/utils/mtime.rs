//! Modification-time helpers.
//!
//! Timestamps crossing module boundaries are epoch milliseconds (`i64`), the
//! unit the change set and the classpath fingerprints are keyed on.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Get the modification time of a file
///
/// Returns `None` if the file doesn't exist or mtime cannot be read
pub fn get_mtime(path: &Path) -> Option<SystemTime> {
    path.metadata().and_then(|m| m.modified()).ok()
}

/// Modification time of `path` in epoch millis.
pub fn mtime_millis(path: &Path) -> Option<i64> {
    get_mtime(path).map(to_millis)
}

/// Convert a `SystemTime` to epoch millis (pre-epoch times clamp to 0).
pub fn to_millis(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_to_millis() {
        let t = UNIX_EPOCH + Duration::from_millis(1_234);
        assert_eq!(to_millis(t), 1_234);
        assert_eq!(to_millis(UNIX_EPOCH), 0);
    }

    #[test]
    fn test_missing_file() {
        assert!(mtime_millis(Path::new("/definitely/not/here.class")).is_none());
    }

    #[test]
    fn test_existing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("A.class");
        std::fs::write(&file, b"cafebabe").unwrap();
        assert!(mtime_millis(&file).unwrap() > 0);
    }
}
