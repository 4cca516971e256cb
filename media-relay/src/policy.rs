//! Size admission policy.
//!
//! Two independent caps gate every job:
//! - the download cap, applied to the pre-fetch estimate and again to the
//!   actual artifact size;
//! - the upload cap, which depends on whether a self-hosted (high-capacity)
//!   Bot API server is configured.
//!
//! Everything here is pure; the worker decides what to do with a rejection.

use serde::{Deserialize, Serialize};

/// Size thresholds, all in megabytes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizePolicy {
    /// Largest artifact worth fetching at all.
    pub download_cap_mb: u64,
    /// Upload limit of the public Bot API.
    pub standard_upload_limit_mb: u64,
    /// Upload limit when a self-hosted Bot API server is used.
    pub high_capacity_upload_limit_mb: u64,
    /// Whether uploads go through a self-hosted Bot API server.
    pub high_capacity: bool,
}

impl Default for SizePolicy {
    fn default() -> Self {
        Self {
            download_cap_mb: 2000,
            standard_upload_limit_mb: 50,
            high_capacity_upload_limit_mb: 2000,
            high_capacity: false,
        }
    }
}

/// Which cap a rejection came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    /// Estimate reported before fetching exceeded the download cap.
    EstimateOverDownloadCap { size_mb: f64, cap_mb: u64 },
    /// Fetched artifact exceeded the download cap.
    OverDownloadCap { size_mb: f64, cap_mb: u64 },
    /// Artifact is within the download cap but cannot be uploaded.
    OverUploadCap {
        size_mb: f64,
        cap_mb: u64,
        high_capacity: bool,
    },
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Admission {
    Admit,
    Reject(Rejection),
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admit)
    }
}

impl SizePolicy {
    /// The upload cap for the configured delivery mode.
    pub fn upload_cap_mb(&self) -> u64 {
        if self.high_capacity {
            self.high_capacity_upload_limit_mb
        } else {
            self.standard_upload_limit_mb
        }
    }

    /// Admit iff `size_mb <= download_cap_mb`.
    ///
    /// The same rule is used for estimates and for actual sizes.
    pub fn within_download_cap(&self, size_mb: f64) -> bool {
        size_mb <= self.download_cap_mb as f64
    }

    /// Pre-fetch check. A missing estimate is admitted; the post-fetch check
    /// catches it later.
    pub fn check_estimate(&self, estimated_mb: Option<f64>) -> Admission {
        match estimated_mb {
            Some(size_mb) if !self.within_download_cap(size_mb) => {
                Admission::Reject(Rejection::EstimateOverDownloadCap {
                    size_mb,
                    cap_mb: self.download_cap_mb,
                })
            }
            _ => Admission::Admit,
        }
    }

    /// Post-fetch check against the download cap only.
    pub fn check_download(&self, size_mb: f64) -> Admission {
        if self.within_download_cap(size_mb) {
            Admission::Admit
        } else {
            Admission::Reject(Rejection::OverDownloadCap {
                size_mb,
                cap_mb: self.download_cap_mb,
            })
        }
    }

    /// Upload check for an artifact that is about to be delivered.
    pub fn check_upload(&self, size_mb: f64) -> Admission {
        let cap_mb = self.upload_cap_mb();
        if size_mb <= cap_mb as f64 {
            Admission::Admit
        } else {
            Admission::Reject(Rejection::OverUploadCap {
                size_mb,
                cap_mb,
                high_capacity: self.high_capacity,
            })
        }
    }
}

impl Rejection {
    /// Ledger detail line for this rejection.
    pub fn detail(&self) -> String {
        match *self {
            Rejection::EstimateOverDownloadCap { size_mb, cap_mb } => {
                format!("{size_mb:.1} MB estimated, download limit {cap_mb} MB")
            }
            Rejection::OverDownloadCap { size_mb, cap_mb } => {
                format!("{size_mb:.1} MB downloaded, download limit {cap_mb} MB")
            }
            Rejection::OverUploadCap {
                size_mb,
                cap_mb,
                high_capacity: true,
            } => format!("{size_mb:.1} MB (> {cap_mb} MB with self-hosted Bot API)"),
            Rejection::OverUploadCap {
                size_mb,
                cap_mb,
                high_capacity: false,
            } => format!("{size_mb:.1} MB downloaded, limit {cap_mb} MB"),
        }
    }

    /// Text sent back to the submitter.
    pub fn user_message(&self) -> String {
        match *self {
            Rejection::EstimateOverDownloadCap { size_mb, cap_mb } => format!(
                "\u{274c} The video is about {size_mb:.1} MB, above the {cap_mb} MB download limit. Nothing was downloaded."
            ),
            Rejection::OverDownloadCap { size_mb, cap_mb } => format!(
                "\u{274c} The downloaded file is {size_mb:.1} MB, above the {cap_mb} MB download limit."
            ),
            Rejection::OverUploadCap {
                size_mb,
                cap_mb,
                high_capacity: true,
            } => format!(
                "\u{274c} The downloaded file is {size_mb:.1} MB and exceeds the {cap_mb} MB upload limit, so it cannot be sent."
            ),
            Rejection::OverUploadCap {
                size_mb,
                cap_mb,
                high_capacity: false,
            } => format!(
                "\u{274c} The file is about {:.2} GB, above the {cap_mb} MB limit of the public Bot API. \
                 Enable a self-hosted Bot API server (TELEGRAM_BOT_API_ENABLED) to send files up to 2 GB.",
                size_mb / 1024.0
            ),
        }
    }
}
