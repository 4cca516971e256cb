//! Submission boundary: ledger entry first, then the queue.

use std::sync::Arc;

use serde::Serialize;

use crate::fetcher::Fetcher;
use crate::ledger::{NewLedgerEntry, StatusLedger};
use crate::notify::Notifier;
use crate::queue::{DeliveryMode, Job, JobQueue, Worker, WorkerSettings};

/// A job as requested by the ingestion layer.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub locator: String,
    pub chat_id: i64,
    pub submitter_id: Option<i64>,
    pub submitter_label: Option<String>,
    pub mode: DeliveryMode,
}

impl JobRequest {
    pub fn new(locator: impl Into<String>, chat_id: i64) -> Self {
        Self {
            locator: locator.into(),
            chat_id,
            submitter_id: None,
            submitter_label: None,
            mode: DeliveryMode::Standard,
        }
    }

    pub fn with_submitter(mut self, id: Option<i64>, label: Option<String>) -> Self {
        self.submitter_id = id;
        self.submitter_label = label;
        self
    }

    pub fn with_mode(mut self, mode: DeliveryMode) -> Self {
        self.mode = mode;
        self
    }
}

/// What the submitter is told after a successful submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubmitReceipt {
    pub entry_id: u64,
    /// 1-based queue position observed just before enqueueing. Advisory only.
    pub position: usize,
}

/// Owns the ledger and the queue with its worker.
pub struct RelayService {
    ledger: Arc<StatusLedger>,
    queue: JobQueue,
}

impl RelayService {
    /// Build the service and start its worker. Must be called inside a Tokio runtime.
    pub fn new(
        settings: WorkerSettings,
        ledger: Arc<StatusLedger>,
        fetcher: Arc<dyn Fetcher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let worker = Worker::new(settings, ledger.clone(), fetcher, notifier);
        Self {
            ledger,
            queue: JobQueue::start(worker),
        }
    }

    /// Record a `queued` ledger entry and enqueue the job.
    pub fn submit(&self, request: JobRequest) -> SubmitReceipt {
        let position = self.queue.pending_count() + 1;
        let entry_id = self.ledger.append(NewLedgerEntry::queued(
            request.locator.clone(),
            request.submitter_id,
            request.submitter_label.clone(),
        ));

        self.queue.enqueue(Job {
            id: entry_id,
            locator: request.locator,
            chat_id: request.chat_id,
            submitter_id: request.submitter_id,
            submitter_label: request.submitter_label,
            mode: request.mode,
        });

        SubmitReceipt { entry_id, position }
    }

    pub fn ledger(&self) -> &Arc<StatusLedger> {
        &self.ledger
    }

    pub fn pending_count(&self) -> usize {
        self.queue.pending_count()
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    /// Stop the worker after the in-flight job.
    pub async fn shutdown(&self) {
        self.queue.shutdown().await;
    }
}
