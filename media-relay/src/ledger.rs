//! Bounded, in-memory record of job lifecycle state.
//!
//! The ledger is a ring ordered newest-first. Entries are appended by the
//! submission path, updated in place by the worker, and evicted oldest-first
//! once capacity is exceeded, whatever their status.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Default number of entries kept.
pub const DEFAULT_LEDGER_CAPACITY: usize = 100;

/// Lifecycle state of a job as seen by observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    /// Waiting in the queue.
    Queued,
    /// Picked up by the worker.
    Fetching,
    /// Delivered through the primary path (or timed out client-side).
    Delivered,
    /// Delivered through the generic-file fallback.
    DeliveredAsFallback,
    /// Rejected by the size policy.
    RejectedTooLarge,
    /// Fetch or delivery failed.
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Fetching => "fetching",
            JobStatus::Delivered => "delivered",
            JobStatus::DeliveredAsFallback => "delivered-as-fallback",
            JobStatus::RejectedTooLarge => "rejected-too-large",
            JobStatus::Failed => "failed",
        }
    }

    /// Whether the job has reached one of its final states.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Queued | JobStatus::Fetching)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields supplied when a ledger entry is created.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub locator: String,
    pub submitter_id: Option<i64>,
    pub submitter_label: Option<String>,
    pub status: JobStatus,
    pub detail: String,
}

impl NewLedgerEntry {
    /// A freshly queued entry.
    pub fn queued(
        locator: impl Into<String>,
        submitter_id: Option<i64>,
        submitter_label: Option<String>,
    ) -> Self {
        Self {
            locator: locator.into(),
            submitter_id,
            submitter_label,
            status: JobStatus::Queued,
            detail: "waiting in queue".to_string(),
        }
    }
}

/// A ledger entry as exposed to observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: u64,
    pub locator: String,
    pub submitter_id: Option<i64>,
    pub submitter_label: Option<String>,
    pub status: JobStatus,
    pub detail: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Label shown for the submitter: the label, else the id, else `-`.
    pub fn submitter_display(&self) -> String {
        match (&self.submitter_label, self.submitter_id) {
            (Some(label), _) if !label.is_empty() => label.clone(),
            (_, Some(id)) => id.to_string(),
            _ => "-".to_string(),
        }
    }
}

struct LedgerInner {
    next_id: u64,
    /// Newest entry at the front.
    entries: VecDeque<LedgerEntry>,
}

/// Concurrency-safe bounded ledger.
pub struct StatusLedger {
    capacity: usize,
    inner: Mutex<LedgerInner>,
}

impl StatusLedger {
    /// Create a ledger that keeps at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(LedgerInner {
                next_id: 1,
                entries: VecDeque::with_capacity(capacity),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert a new entry at the head and return its id.
    pub fn append(&self, entry: NewLedgerEntry) -> u64 {
        let now = Utc::now();
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;

        inner.entries.push_front(LedgerEntry {
            id,
            locator: entry.locator,
            submitter_id: entry.submitter_id,
            submitter_label: entry.submitter_label,
            status: entry.status,
            detail: entry.detail,
            created_at: now,
            updated_at: now,
        });
        while inner.entries.len() > self.capacity {
            inner.entries.pop_back();
        }
        id
    }

    /// Update status and detail of an existing entry.
    ///
    /// Returns `false` when the id is unknown or was already evicted.
    pub fn update(&self, id: u64, status: JobStatus, detail: impl Into<String>) -> bool {
        let mut inner = self.inner.lock();
        match inner.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.status = status;
                entry.detail = detail.into();
                entry.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: u64) -> Option<LedgerEntry> {
        self.inner.lock().entries.iter().find(|e| e.id == id).cloned()
    }

    /// All retained entries, newest first.
    pub fn snapshot(&self) -> Vec<LedgerEntry> {
        self.inner.lock().entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for StatusLedger {
    fn default() -> Self {
        Self::new(DEFAULT_LEDGER_CAPACITY)
    }
}
