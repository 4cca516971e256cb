//! Per-job pipeline: fetch, admit, deliver.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, warn};

use super::{DeliveryMode, Job};
use crate::config::AppConfig;
use crate::delivery::{self, ArtifactGuard, DeliveryOutcome};
use crate::fetcher::{FetchOutcome, FetchRequest, Fetcher};
use crate::ledger::{JobStatus, StatusLedger};
use crate::messages;
use crate::notify::Notifier;
use crate::panic_hook::payload_message;
use crate::policy::{Admission, Rejection, SizePolicy};
use crate::utils::fs::{ContainedPath, file_size_mb, resolve_under};
use crate::{Error, Result};

/// Settings the pipeline reads for every job.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub policy: SizePolicy,
    pub download_dir: PathBuf,
    pub delete_after_send: bool,
}

impl WorkerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            policy: config.policy,
            download_dir: config.download_dir.clone(),
            delete_after_send: config.delete_after_send,
        }
    }
}

/// Executes jobs against the fetch and notification collaborators.
pub struct Worker {
    settings: WorkerSettings,
    ledger: Arc<StatusLedger>,
    fetcher: Arc<dyn Fetcher>,
    notifier: Arc<dyn Notifier>,
}

impl Worker {
    pub fn new(
        settings: WorkerSettings,
        ledger: Arc<StatusLedger>,
        fetcher: Arc<dyn Fetcher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            settings,
            ledger,
            fetcher,
            notifier,
        }
    }

    /// Run one job to completion, containing any error or panic it raises.
    pub(super) async fn run_job(self: &Arc<Self>, job: Job) {
        let entry_id = job.id;
        let chat_id = job.chat_id;
        info!(entry_id, locator = %job.locator, mode = ?job.mode, "Processing job");

        let worker = self.clone();
        let result = tokio::spawn(async move { worker.process(&job).await }).await;

        let failure = match result {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(join_error) if join_error.is_panic() => {
                format!("panic: {}", payload_message(join_error.into_panic().as_ref()))
            }
            Err(join_error) => join_error.to_string(),
        };

        error!(entry_id, error = %failure, "Job failed unexpectedly");
        self.ledger.update(
            entry_id,
            JobStatus::Failed,
            format!("unexpected error: {failure}"),
        );
        self.send_text(chat_id, messages::GENERIC_ERROR).await;
    }

    async fn process(&self, job: &Job) -> Result<()> {
        match job.mode {
            DeliveryMode::Invalid => {
                warn!(entry_id = job.id, "Rejecting job with unsupported delivery mode");
                self.fail(job, "unsupported delivery mode").await;
                Ok(())
            }
            DeliveryMode::UploadOnly => self.process_local_file(job).await,
            DeliveryMode::Standard | DeliveryMode::DownloadOnly => self.process_remote(job).await,
        }
    }

    async fn process_remote(&self, job: &Job) -> Result<()> {
        let policy = self.settings.policy;
        self.ledger
            .update(job.id, JobStatus::Fetching, "in progress");

        let outcome = self.fetch(job).await?;

        if outcome.is_skipped() {
            let rejection = Rejection::EstimateOverDownloadCap {
                size_mb: outcome.estimated_size_mb().unwrap_or_default(),
                cap_mb: policy.download_cap_mb,
            };
            self.reject(job, rejection).await;
            return Ok(());
        }

        let reused = outcome.is_reused();
        let Some(path) = outcome.into_artifact() else {
            self.fail(job, "download failed").await;
            return Ok(());
        };

        let retain = !self.settings.delete_after_send || job.mode == DeliveryMode::DownloadOnly;
        let artifact = ArtifactGuard::new(path, retain);

        if reused {
            let name = artifact.file_name();
            self.ledger.update(
                job.id,
                JobStatus::Fetching,
                format!("file already present: {name}"),
            );
            self.send_text(job.chat_id, &messages::already_present(&name))
                .await;
        }

        let size_mb = file_size_mb(artifact.path())?;
        if let Admission::Reject(rejection) = policy.check_download(size_mb) {
            self.reject(job, rejection).await;
            return Ok(());
        }

        if job.mode == DeliveryMode::DownloadOnly {
            let mut detail = format!("{size_mb:.1} MB stored");
            if reused {
                detail.push_str(" (reused)");
            }
            self.ledger.update(job.id, JobStatus::Delivered, detail);
            self.send_text(job.chat_id, &messages::stored(artifact.path(), size_mb))
                .await;
            return Ok(());
        }

        self.deliver(job, &artifact, size_mb, reused).await;
        Ok(())
    }

    /// Deliver a file that is already on disk. The file is never deleted.
    ///
    /// Only files under the download directory can be sent.
    async fn process_local_file(&self, job: &Job) -> Result<()> {
        let path = match resolve_under(&self.settings.download_dir, Path::new(&job.locator)) {
            ContainedPath::Inside(path) => path,
            ContainedPath::Outside => {
                warn!(entry_id = job.id, path = %job.locator, "Refusing path outside the download directory");
                self.ledger.update(
                    job.id,
                    JobStatus::Failed,
                    "path outside download directory",
                );
                self.send_text(job.chat_id, &messages::outside_download_dir(&job.locator))
                    .await;
                return Ok(());
            }
            ContainedPath::Missing => {
                warn!(entry_id = job.id, path = %job.locator, "Local file not found");
                self.ledger
                    .update(job.id, JobStatus::Failed, "local file not found");
                self.send_text(job.chat_id, &messages::local_file_missing(&job.locator))
                    .await;
                return Ok(());
            }
        };

        let artifact = ArtifactGuard::new(path, true);
        self.ledger.update(
            job.id,
            JobStatus::Fetching,
            format!("file already present: {}", artifact.file_name()),
        );

        let size_mb = file_size_mb(artifact.path())?;
        self.deliver(job, &artifact, size_mb, true).await;
        Ok(())
    }

    /// Run the fetcher on a blocking thread.
    async fn fetch(&self, job: &Job) -> Result<FetchOutcome> {
        let request = FetchRequest {
            locator: job.locator.clone(),
            download_dir: self.settings.download_dir.clone(),
            submitter_id: job.submitter_id,
            submitter_label: job.submitter_label.clone(),
            download_cap_mb: self.settings.policy.download_cap_mb,
        };
        let fetcher = self.fetcher.clone();

        match tokio::task::spawn_blocking(move || fetcher.fetch(&request)).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => {
                warn!(entry_id = job.id, error = %e, "Fetch failed");
                Ok(FetchOutcome::failed())
            }
            Err(join_error) if join_error.is_panic() => {
                std::panic::resume_unwind(join_error.into_panic())
            }
            Err(join_error) => Err(Error::fetch(format!("fetch task aborted: {join_error}"))),
        }
    }

    /// Upload check, then the delivery strategy.
    async fn deliver(&self, job: &Job, artifact: &ArtifactGuard, size_mb: f64, reused: bool) {
        if let Admission::Reject(rejection) = self.settings.policy.check_upload(size_mb) {
            self.reject(job, rejection).await;
            return;
        }

        let caption = delivery::caption(size_mb);
        let outcome =
            delivery::deliver(self.notifier.as_ref(), job.chat_id, artifact.path(), &caption)
                .await;

        if outcome.is_delivered() {
            info!(entry_id = job.id, status = %outcome.status(), "Delivery finished");
        } else {
            warn!(entry_id = job.id, ?outcome, "Delivery failed");
        }
        self.ledger
            .update(job.id, outcome.status(), outcome.detail(size_mb, reused));

        match outcome {
            DeliveryOutcome::DeliveredUnconfirmed => {
                self.send_text(job.chat_id, messages::STILL_PROCESSING)
                    .await;
            }
            DeliveryOutcome::Failed { .. } => {
                self.send_text(job.chat_id, messages::GENERIC_ERROR).await;
            }
            DeliveryOutcome::Delivered | DeliveryOutcome::DeliveredAsFallback { .. } => {}
        }
    }

    async fn reject(&self, job: &Job, rejection: Rejection) {
        info!(entry_id = job.id, detail = %rejection.detail(), "Job rejected by size policy");
        self.ledger
            .update(job.id, JobStatus::RejectedTooLarge, rejection.detail());
        self.send_text(job.chat_id, &rejection.user_message()).await;
    }

    async fn fail(&self, job: &Job, detail: &str) {
        self.ledger.update(job.id, JobStatus::Failed, detail);
        self.send_text(job.chat_id, messages::GENERIC_ERROR).await;
    }

    /// Best-effort status text.
    async fn send_text(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.notifier.send_text(chat_id, text).await {
            warn!(chat_id, error = %e, "Failed to send status message");
        }
    }
}
