//! Filesystem helpers shared across modules.
//!
//! These helpers provide consistent error context (operation + path) for the
//! handful of file operations the relay performs on artifacts.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::{Error, Result};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Ensure a directory exists (synchronous), creating it recursively if needed.
pub fn ensure_dir_all_sync_with_op(op: &'static str, path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| Error::io_path(op, path, e))
}

/// Size of a file in megabytes (MiB).
pub fn file_size_mb(path: &Path) -> Result<f64> {
    let meta = std::fs::metadata(path).map_err(|e| Error::io_path("reading size of", path, e))?;
    Ok(bytes_to_mb(meta.len()))
}

pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

/// Where a user-supplied path points, relative to a base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainedPath {
    /// Existing regular file under the base; canonical path.
    Inside(PathBuf),
    /// Resolves (after following symlinks) to somewhere outside the base.
    Outside,
    /// Does not exist or is not a regular file.
    Missing,
}

/// Resolve `path` against `base` and check that it stays under `base`.
///
/// Relative paths are taken relative to `base`. Both sides are canonicalized,
/// so `..` components and symlinks cannot escape.
pub fn resolve_under(base: &Path, path: &Path) -> ContainedPath {
    let Ok(base) = std::fs::canonicalize(base) else {
        return ContainedPath::Missing;
    };
    let Ok(resolved) = std::fs::canonicalize(base.join(path)) else {
        return ContainedPath::Missing;
    };
    if !resolved.starts_with(&base) {
        return ContainedPath::Outside;
    }
    if resolved.is_file() {
        ContainedPath::Inside(resolved)
    } else {
        ContainedPath::Missing
    }
}

/// Remove a file if it exists. Failures are logged, never propagated.
///
/// Returns `true` when a file was actually removed.
pub fn remove_file_logged(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => {
            info!(path = %path.display(), "Artifact removed");
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to remove artifact");
            false
        }
    }
}
