use std::path::{Path, PathBuf};

use tracing::debug;

use crate::utils::fs::remove_file_logged;

/// Owns a fetched artifact on disk for the duration of a job.
///
/// Dropping the guard deletes the file unless it is retained. Drop runs on
/// every exit path of the job, including early returns and panics.
#[derive(Debug)]
pub struct ArtifactGuard {
    path: PathBuf,
    retain: bool,
}

impl ArtifactGuard {
    pub fn new(path: impl Into<PathBuf>, retain: bool) -> Self {
        Self {
            path: path.into(),
            retain,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Display name of the artifact (its file name).
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        if self.retain {
            debug!(path = %self.path.display(), "Artifact kept");
        } else {
            remove_file_logged(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"data").unwrap();
        path
    }

    #[test]
    fn released_artifact_is_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch(dir.path(), "a.mp4");
        drop(ArtifactGuard::new(&path, false));
        assert!(!path.exists());
    }

    #[test]
    fn retained_artifact_survives() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch(dir.path(), "b.mp4");
        let guard = ArtifactGuard::new(&path, true);
        assert_eq!(guard.file_name(), "b.mp4");
        drop(guard);
        assert!(path.exists());
    }

    #[test]
    fn cleanup_runs_during_unwind() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch(dir.path(), "c.mp4");
        let moved = path.clone();

        let result = std::panic::catch_unwind(move || {
            let _guard = ArtifactGuard::new(moved, false);
            panic!("job blew up");
        });

        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        drop(ArtifactGuard::new(dir.path().join("gone.mp4"), false));
    }
}
