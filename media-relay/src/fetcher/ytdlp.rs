//! Fetcher backed by the `yt-dlp` executable.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{FetchOutcome, FetchRequest, Fetcher};
use crate::config::FetcherConfig;
use crate::utils::filename::{owner_dir_name, sanitize_filename};
use crate::utils::fs::{bytes_to_mb, ensure_dir_all_sync_with_op};
use crate::{Error, Result};

/// Longest title prefix used in output file names.
const MAX_TITLE_CHARS: usize = 80;

/// Container the downloads are merged into.
const MERGE_FORMAT: &str = "mp4";

/// Subset of `--dump-single-json` output we rely on.
#[derive(Debug, Default, Deserialize)]
struct ProbeInfo {
    id: Option<String>,
    title: Option<String>,
    ext: Option<String>,
    filesize: Option<f64>,
    filesize_approx: Option<f64>,
    #[serde(default)]
    requested_formats: Vec<FormatInfo>,
}

#[derive(Debug, Deserialize)]
struct FormatInfo {
    filesize: Option<f64>,
    filesize_approx: Option<f64>,
}

impl ProbeInfo {
    /// Size estimate in MB, if the extractor reported one.
    ///
    /// Merged downloads report sizes per requested format.
    fn estimated_size_mb(&self) -> Option<f64> {
        let bytes = if self.requested_formats.is_empty() {
            self.filesize.or(self.filesize_approx)
        } else {
            self.requested_formats
                .iter()
                .map(|f| f.filesize.or(f.filesize_approx))
                .sum::<Option<f64>>()
        }?;
        (bytes > 0.0).then(|| bytes_to_mb(bytes as u64))
    }

    /// Sanitized file stem derived from the title.
    fn file_stem(&self) -> String {
        let raw = self
            .title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or(self.id.as_deref())
            .unwrap_or("video");
        let truncated: String = raw.chars().take(MAX_TITLE_CHARS).collect();
        sanitize_filename(&truncated)
    }
}

/// Runs `yt-dlp` as a child process.
pub struct YtDlpFetcher {
    config: FetcherConfig,
}

impl YtDlpFetcher {
    pub fn new(config: FetcherConfig) -> Self {
        Self { config }
    }

    /// Detect the installed version, if the binary can be run.
    pub fn detect_version(&self) -> Option<String> {
        Command::new(&self.config.binary_path)
            .arg("--version")
            .output()
            .ok()
            .filter(|output| output.status.success())
            .and_then(|output| String::from_utf8(output.stdout).ok())
            .map(|s| s.trim().to_string())
    }

    fn probe(&self, locator: &str) -> Result<ProbeInfo> {
        let output = Command::new(&self.config.binary_path)
            .args(&self.config.extra_args)
            .args(["--dump-single-json", "--no-playlist", "--no-warnings"])
            .arg(locator)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                Error::fetch(format!(
                    "failed to run {}: {e}",
                    self.config.binary_path
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::fetch(format!(
                "probe exited with code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }

    fn download(&self, locator: &str, dir: &Path, stem: &str) -> Result<bool> {
        let template = dir.join(format!("{stem}.%(ext)s"));
        let output = Command::new(&self.config.binary_path)
            .args(&self.config.extra_args)
            .args(download_args(&template))
            .arg(locator)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                Error::fetch(format!(
                    "failed to run {}: {e}",
                    self.config.binary_path
                ))
            })?;

        if !output.status.success() {
            warn!(
                locator,
                code = output.status.code().unwrap_or(-1),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "yt-dlp download failed"
            );
        }
        Ok(output.status.success())
    }
}

/// Arguments for the download invocation, excluding the locator.
fn download_args(template: &Path) -> Vec<String> {
    vec![
        "-f".to_string(),
        "bestvideo+bestaudio/best".to_string(),
        "--merge-output-format".to_string(),
        MERGE_FORMAT.to_string(),
        "--no-playlist".to_string(),
        "--no-progress".to_string(),
        "-o".to_string(),
        template.to_string_lossy().into_owned(),
    ]
}

/// Directory the artifact of this request lives in.
fn target_dir(request: &FetchRequest) -> PathBuf {
    match owner_dir_name(request.submitter_id, request.submitter_label.as_deref()) {
        Some(owner) => request.download_dir.join(owner),
        None => request.download_dir.clone(),
    }
}

/// First existing file among the merged container and the probed extension.
fn find_artifact(dir: &Path, stem: &str, probed_ext: Option<&str>) -> Option<PathBuf> {
    std::iter::once(MERGE_FORMAT)
        .chain(probed_ext)
        .map(|ext| dir.join(format!("{stem}.{ext}")))
        .find(|path| path.is_file())
}

impl Fetcher for YtDlpFetcher {
    fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome> {
        let info = self.probe(&request.locator)?;
        let estimate = info.estimated_size_mb();
        debug!(locator = %request.locator, ?estimate, "Probed media");

        if let Some(size_mb) = estimate
            && size_mb > request.download_cap_mb as f64
        {
            info!(
                locator = %request.locator,
                "Skipping download: estimated {size_mb:.1} MB exceeds {} MB",
                request.download_cap_mb
            );
            return Ok(FetchOutcome::skipped(size_mb));
        }

        let dir = target_dir(request);
        ensure_dir_all_sync_with_op("creating download directory", &dir)?;

        let stem = info.file_stem();
        if let Some(existing) = find_artifact(&dir, &stem, info.ext.as_deref()) {
            info!(path = %existing.display(), "Reusing existing file");
            return Ok(FetchOutcome::fetched(existing, true, estimate));
        }

        if !self.download(&request.locator, &dir, &stem)? {
            return Ok(FetchOutcome::failed());
        }

        match find_artifact(&dir, &stem, info.ext.as_deref()) {
            Some(path) => {
                info!(path = %path.display(), "Video downloaded");
                Ok(FetchOutcome::fetched(path, false, estimate))
            }
            None => {
                warn!(dir = %dir.display(), stem, "yt-dlp succeeded but no output file was found");
                Ok(FetchOutcome::failed())
            }
        }
    }
}
