//! Media fetch collaborator.
//!
//! Fetching is synchronous; the worker runs it on a blocking thread.

mod ytdlp;

pub use ytdlp::YtDlpFetcher;

use std::path::{Path, PathBuf};

use crate::Result;

/// Everything a fetcher needs to know about one job.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub locator: String,
    pub download_dir: PathBuf,
    pub submitter_id: Option<i64>,
    pub submitter_label: Option<String>,
    /// Abandon the fetch when the estimate exceeds this.
    pub download_cap_mb: u64,
}

/// Result of a fetch attempt.
///
/// Exactly one of these holds: an artifact is present, the fetch was
/// skipped, or neither (hard failure). Use the constructors.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    artifact: Option<PathBuf>,
    reused: bool,
    skipped: bool,
    estimated_size_mb: Option<f64>,
}

impl FetchOutcome {
    /// An artifact is available at `path`.
    pub fn fetched(path: impl Into<PathBuf>, reused: bool, estimated_size_mb: Option<f64>) -> Self {
        Self {
            artifact: Some(path.into()),
            reused,
            skipped: false,
            estimated_size_mb,
        }
    }

    /// The estimate exceeded the download cap; nothing was fetched.
    pub fn skipped(estimated_size_mb: f64) -> Self {
        Self {
            artifact: None,
            reused: false,
            skipped: true,
            estimated_size_mb: Some(estimated_size_mb),
        }
    }

    /// The fetch failed without producing an artifact.
    pub fn failed() -> Self {
        Self {
            artifact: None,
            reused: false,
            skipped: false,
            estimated_size_mb: None,
        }
    }

    pub fn artifact(&self) -> Option<&Path> {
        self.artifact.as_deref()
    }

    pub fn into_artifact(self) -> Option<PathBuf> {
        self.artifact
    }

    pub fn is_reused(&self) -> bool {
        self.reused
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    pub fn is_failed(&self) -> bool {
        self.artifact.is_none() && !self.skipped
    }

    pub fn estimated_size_mb(&self) -> Option<f64> {
        self.estimated_size_mb
    }
}

/// Fetch provider.
pub trait Fetcher: Send + Sync {
    /// Fetch the resource named by `request.locator`.
    ///
    /// Blocking; callers must not invoke this on an async worker thread.
    fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_produce_exclusive_states() {
        let fetched = FetchOutcome::fetched("/tmp/a.mp4", true, Some(10.0));
        assert_eq!(fetched.artifact(), Some(Path::new("/tmp/a.mp4")));
        assert!(fetched.is_reused());
        assert!(!fetched.is_skipped() && !fetched.is_failed());

        let skipped = FetchOutcome::skipped(800.0);
        assert!(skipped.is_skipped());
        assert!(skipped.artifact().is_none() && !skipped.is_failed());
        assert_eq!(skipped.estimated_size_mb(), Some(800.0));

        let failed = FetchOutcome::failed();
        assert!(failed.is_failed());
        assert!(!failed.is_skipped() && failed.artifact().is_none());
    }
}
