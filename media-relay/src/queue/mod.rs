//! Single-consumer FIFO job queue.
//!
//! One worker task is spawned when the queue starts and processes jobs
//! strictly one at a time, in submission order.

mod worker;

pub use worker::{Worker, WorkerSettings};

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// What the worker does with a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Fetch, admit, deliver.
    #[default]
    Standard,
    /// Deliver a file that already exists locally; the locator is its path.
    UploadOnly,
    /// Fetch and keep the artifact; no file delivery.
    DownloadOnly,
    /// Not processable.
    Invalid,
}

/// A unit of work. Immutable once enqueued.
#[derive(Debug, Clone)]
pub struct Job {
    /// Ledger entry id assigned at submission.
    pub id: u64,
    pub locator: String,
    /// Chat that receives the artifact and status texts.
    pub chat_id: i64,
    pub submitter_id: Option<i64>,
    pub submitter_label: Option<String>,
    pub mode: DeliveryMode,
}

/// Queue storage shared with the worker task.
struct QueueState {
    jobs: Mutex<VecDeque<Job>>,
    notify: Notify,
}

impl QueueState {
    /// Wait until a job is available and take it.
    async fn next(&self) -> Job {
        loop {
            if let Some(job) = self.jobs.lock().pop_front() {
                return job;
            }
            self.notify.notified().await;
        }
    }
}

/// FIFO queue with its dedicated worker.
pub struct JobQueue {
    state: Arc<QueueState>,
    cancellation_token: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl JobQueue {
    /// Create the queue and spawn its worker. Must be called inside a Tokio runtime.
    pub fn start(worker: Worker) -> Self {
        let state = Arc::new(QueueState {
            jobs: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        });
        let cancellation_token = CancellationToken::new();

        let handle = tokio::spawn(run_worker(
            state.clone(),
            Arc::new(worker),
            cancellation_token.clone(),
        ));

        Self {
            state,
            cancellation_token,
            worker: Mutex::new(Some(handle)),
        }
    }

    /// Append a job. Returns immediately.
    pub fn enqueue(&self, job: Job) {
        debug!(entry_id = job.id, mode = ?job.mode, "Job enqueued");
        self.state.jobs.lock().push_back(job);
        self.state.notify.notify_one();
    }

    /// Jobs waiting to be started; the job in progress is not counted.
    pub fn pending_count(&self) -> usize {
        self.state.jobs.lock().len()
    }

    /// Stop the worker once the in-flight job, if any, has finished.
    /// Jobs still waiting are dropped.
    pub async fn shutdown(&self) {
        self.cancellation_token.cancel();

        // Take the handle out of the mutex before awaiting
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Queue worker ended abnormally");
            }
            let dropped = self.state.jobs.lock().len();
            info!(dropped, "Queue worker stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        !self.cancellation_token.is_cancelled()
    }
}

impl Drop for JobQueue {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}

async fn run_worker(state: Arc<QueueState>, worker: Arc<Worker>, cancellation_token: CancellationToken) {
    debug!("Queue worker started");

    loop {
        let job = tokio::select! {
            biased;
            _ = cancellation_token.cancelled() => {
                debug!("Queue worker shutting down");
                break;
            }
            job = state.next() => job,
        };

        worker.run_job(job).await;
    }
}
