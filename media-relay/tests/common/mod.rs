//! Hand-written collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use media_relay::Result;
use media_relay::fetcher::{FetchOutcome, FetchRequest, Fetcher};
use media_relay::ledger::{JobStatus, LedgerEntry, StatusLedger};
use media_relay::notify::{Notifier, SendError};
use media_relay::policy::SizePolicy;
use media_relay::queue::WorkerSettings;
use media_relay::service::RelayService;

/// Ordered record of everything the collaborators saw.
pub type EventLog = Arc<Mutex<Vec<String>>>;

/// How the scripted fetcher answers a locator.
pub enum Script {
    /// Write a sparse file of `size_mb` and return it.
    Artifact { size_mb: u64, reused: bool },
    /// Same as `Artifact` but with an estimate attached.
    ArtifactWithEstimate { size_mb: u64, estimate_mb: f64 },
    Skip { estimate_mb: f64 },
    Fail,
    Error,
    Panic,
    /// Block until the test sends on the gate, then produce a small artifact.
    Gated(Mutex<mpsc::Receiver<()>>),
}

pub struct ScriptedFetcher {
    dir: PathBuf,
    scripts: HashMap<String, Script>,
    events: EventLog,
}

impl ScriptedFetcher {
    pub fn new(dir: &Path, events: EventLog) -> Self {
        Self {
            dir: dir.to_path_buf(),
            scripts: HashMap::new(),
            events,
        }
    }

    pub fn script(mut self, locator: &str, script: Script) -> Self {
        self.scripts.insert(locator.to_string(), script);
        self
    }

    /// Add a gated locator and return the sender that releases it.
    pub fn gated(self, locator: &str) -> (Self, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        (self.script(locator, Script::Gated(Mutex::new(rx))), tx)
    }

    fn artifact_path(&self, locator: &str) -> PathBuf {
        let name: String = locator
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.mp4"))
    }
}

/// Create a sparse file of the given size.
pub fn sparse_file(path: &Path, size_mb: u64) {
    let file = std::fs::File::create(path).unwrap();
    file.set_len(size_mb * 1024 * 1024).unwrap();
}

impl Fetcher for ScriptedFetcher {
    fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome> {
        let locator = request.locator.as_str();
        self.events.lock().push(format!("fetch-start:{locator}"));
        let path = self.artifact_path(locator);

        let outcome = match self.scripts.get(locator) {
            Some(Script::Artifact { size_mb, reused }) => {
                sparse_file(&path, *size_mb);
                Ok(FetchOutcome::fetched(path, *reused, None))
            }
            Some(Script::ArtifactWithEstimate {
                size_mb,
                estimate_mb,
            }) => {
                sparse_file(&path, *size_mb);
                Ok(FetchOutcome::fetched(path, false, Some(*estimate_mb)))
            }
            Some(Script::Skip { estimate_mb }) => Ok(FetchOutcome::skipped(*estimate_mb)),
            Some(Script::Fail) => Ok(FetchOutcome::failed()),
            Some(Script::Error) => Err(media_relay::Error::fetch("extractor exploded")),
            Some(Script::Panic) => panic!("fetcher panicked on {locator}"),
            Some(Script::Gated(gate)) => {
                let _ = gate.lock().recv_timeout(Duration::from_secs(10));
                sparse_file(&path, 1);
                Ok(FetchOutcome::fetched(path, false, None))
            }
            None => {
                sparse_file(&path, 1);
                Ok(FetchOutcome::fetched(path, false, None))
            }
        };

        self.events.lock().push(format!("fetch-end:{locator}"));
        outcome
    }
}

/// A call received by the recording notifier.
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Rich { chat_id: i64, caption: String },
    Generic { chat_id: i64, caption: String },
    Text { chat_id: i64, text: String },
}

/// Notifier with fixed results for file sends that records every call.
pub struct RecordingNotifier {
    rich: std::result::Result<(), SendError>,
    generic: std::result::Result<(), SendError>,
    sent: Mutex<Vec<Sent>>,
    events: EventLog,
}

impl RecordingNotifier {
    pub fn new(events: EventLog) -> Self {
        Self {
            rich: Ok(()),
            generic: Ok(()),
            sent: Mutex::new(Vec::new()),
            events,
        }
    }

    pub fn rich_result(mut self, result: std::result::Result<(), SendError>) -> Self {
        self.rich = result;
        self
    }

    pub fn generic_result(mut self, result: std::result::Result<(), SendError>) -> Self {
        self.generic = result;
        self
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    pub fn texts_to(&self, chat: i64) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { chat_id, text } if chat_id == chat => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn file_sends(&self) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|s| !matches!(s, Sent::Text { .. }))
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_rich_media(
        &self,
        chat_id: i64,
        artifact: &Path,
        caption: &str,
    ) -> std::result::Result<(), SendError> {
        assert!(artifact.exists(), "artifact must exist while it is sent");
        self.events.lock().push(format!("rich:{chat_id}"));
        self.sent.lock().push(Sent::Rich {
            chat_id,
            caption: caption.to_string(),
        });
        self.rich.clone()
    }

    async fn send_generic_file(
        &self,
        chat_id: i64,
        artifact: &Path,
        caption: &str,
    ) -> std::result::Result<(), SendError> {
        assert!(artifact.exists(), "artifact must exist while it is sent");
        self.events.lock().push(format!("generic:{chat_id}"));
        self.sent.lock().push(Sent::Generic {
            chat_id,
            caption: caption.to_string(),
        });
        self.generic.clone()
    }

    async fn send_text(&self, chat_id: i64, text: &str) -> std::result::Result<(), SendError> {
        self.events.lock().push(format!("text:{chat_id}"));
        self.sent.lock().push(Sent::Text {
            chat_id,
            text: text.to_string(),
        });
        Ok(())
    }
}

pub fn policy(download_cap_mb: u64, standard_upload_limit_mb: u64, high_capacity: bool) -> SizePolicy {
    SizePolicy {
        download_cap_mb,
        standard_upload_limit_mb,
        high_capacity_upload_limit_mb: 2000,
        high_capacity,
    }
}

pub fn settings(dir: &Path, policy: SizePolicy, delete_after_send: bool) -> WorkerSettings {
    WorkerSettings {
        policy,
        download_dir: dir.to_path_buf(),
        delete_after_send,
    }
}

pub fn new_events() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn service(
    settings: WorkerSettings,
    fetcher: ScriptedFetcher,
    notifier: Arc<RecordingNotifier>,
) -> RelayService {
    RelayService::new(
        settings,
        Arc::new(StatusLedger::new(100)),
        Arc::new(fetcher),
        notifier,
    )
}

/// Poll the ledger until the entry reaches a terminal status.
pub async fn wait_terminal(ledger: &StatusLedger, id: u64) -> LedgerEntry {
    wait_for(ledger, id, |e| e.status.is_terminal()).await
}

pub async fn wait_for(
    ledger: &StatusLedger,
    id: u64,
    predicate: impl Fn(&LedgerEntry) -> bool,
) -> LedgerEntry {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        if let Some(entry) = ledger.get(id)
            && predicate(&entry)
        {
            return entry;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "entry {id} did not reach the expected state: {:?}",
            ledger.get(id)
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub fn status_of(ledger: &StatusLedger, id: u64) -> JobStatus {
    ledger.get(id).map(|e| e.status).unwrap()
}
