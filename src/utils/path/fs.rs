//! Path normalization utilities.
//!
//! Provides consistent path handling across the codebase:
//! - `normalize_path` - file system paths (canonicalize + fallback)
//! - `resolve_path` - resolve relative paths with fallback directory

use std::path::{Path, PathBuf};

/// Normalize a file system path to absolute form.
///
/// Tries `canonicalize()` first (resolves symlinks, `.`, `..`).
/// Falls back to:
/// - Return as-is if already absolute
/// - Join with current directory if relative
///
/// # Example
/// ```ignore
/// use devloop::utils::path::normalize_path;
/// let abs = normalize_path(Path::new("./core/src/main/java"));
/// ```
#[inline]
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        }
    })
}

/// Resolve a path that may be relative to cwd or a fallback directory.
///
/// Always returns an absolute path.
///
/// Tries in order:
/// 1. If absolute, use as-is
/// 2. If exists relative to cwd, normalize to absolute
/// 3. Otherwise, resolve relative to fallback_dir
///
/// # Example
/// ```ignore
/// use devloop::utils::path::resolve_path;
/// // User passes "src/main/java/A.java", fallback is the project root
/// let resolved = resolve_path(Path::new("src/main/java/A.java"), root);
/// ```
#[inline]
pub fn resolve_path(path: &Path, fallback_dir: &Path) -> PathBuf {
    // Absolute path: use as-is
    if path.is_absolute() {
        return path.to_path_buf();
    }

    // Try cwd-relative first (handles `core/src/main/java/A.java` from the root)
    if path.exists() {
        return normalize_path(path);
    }

    // Fall back to fallback_dir-relative
    normalize_path(&fallback_dir.join(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_missing_module_root_kept() {
        // Output dirs usually don't exist before the first build
        let path = Path::new("/proj/web/target/classes");
        assert_eq!(normalize_path(path), PathBuf::from("/proj/web/target/classes"));
        assert!(normalize_path(Path::new("web/target/classes")).is_absolute());
    }

    #[test]
    fn test_normalize_existing_root_resolves_dots() {
        let dir = TempDir::new().unwrap();
        let java = dir.path().join("core/src/main/java");
        fs::create_dir_all(&java).unwrap();

        let dotted = dir.path().join("core/src/../src/main/./java");
        assert_eq!(normalize_path(&dotted), java.canonicalize().unwrap());
    }

    #[test]
    fn test_resolve_changed_path_against_root() {
        let resolved = resolve_path(Path::new("/proj/core/A.java"), Path::new("/elsewhere"));
        assert_eq!(resolved, PathBuf::from("/proj/core/A.java"));

        let resolved = resolve_path(Path::new("no-such-module/A.java"), Path::new("/proj"));
        assert_eq!(resolved, PathBuf::from("/proj/no-such-module/A.java"));
    }
}
