//! Response bodies of the dashboard API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::{JobStatus, LedgerEntry};

/// One ledger entry as exposed over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadView {
    pub id: u64,
    pub url: String,
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub status: JobStatus,
    pub detail: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<LedgerEntry> for DownloadView {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            id: entry.id,
            url: entry.locator,
            user_id: entry.submitter_id,
            username: entry.submitter_label,
            status: entry.status,
            detail: entry.detail,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Newest first.
    pub downloads: Vec<DownloadView>,
    /// Jobs waiting behind the one in progress.
    pub pending: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsResponse {
    /// Newest first.
    pub logs: Vec<String>,
}

/// Query parameters for `/api/logs`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub queue_running: bool,
}
