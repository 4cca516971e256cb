//! Delivery strategy: rich media first, generic file as fallback.
//!
//! A client-side timeout on the primary send counts as delivered and no
//! fallback is attempted; the server may still be processing the upload.

mod artifact;

pub use artifact::ArtifactGuard;

use std::path::Path;

use tracing::{info, warn};

use crate::ledger::JobStatus;
use crate::notify::{Notifier, SendError};

/// Terminal result of a delivery attempt.
#[derive(Debug, Clone)]
pub enum DeliveryOutcome {
    /// Primary send succeeded.
    Delivered,
    /// Primary send timed out client-side; assumed to complete server-side.
    DeliveredUnconfirmed,
    /// Primary send failed, fallback succeeded.
    DeliveredAsFallback { primary_error: SendError },
    /// Both sends failed.
    Failed {
        primary_error: SendError,
        fallback_error: SendError,
    },
}

impl DeliveryOutcome {
    /// Ledger status for this outcome.
    pub fn status(&self) -> JobStatus {
        match self {
            DeliveryOutcome::Delivered | DeliveryOutcome::DeliveredUnconfirmed => {
                JobStatus::Delivered
            }
            DeliveryOutcome::DeliveredAsFallback { .. } => JobStatus::DeliveredAsFallback,
            DeliveryOutcome::Failed { .. } => JobStatus::Failed,
        }
    }

    /// Ledger detail for this outcome.
    pub fn detail(&self, size_mb: f64, reused: bool) -> String {
        let mut detail = format!("{size_mb:.1} MB");
        if reused {
            detail.push_str(" (reused)");
        }
        match self {
            DeliveryOutcome::Delivered => detail,
            DeliveryOutcome::DeliveredUnconfirmed => {
                detail.push_str(" - client timeout, upload still processing");
                detail
            }
            DeliveryOutcome::DeliveredAsFallback { primary_error } => {
                format!("{detail} (video send failed: {primary_error})")
            }
            DeliveryOutcome::Failed {
                primary_error,
                fallback_error,
            } => format!("upload failed: video: {primary_error}; document: {fallback_error}"),
        }
    }

    pub fn is_delivered(&self) -> bool {
        !matches!(self, DeliveryOutcome::Failed { .. })
    }
}

/// Caption attached to the delivered artifact.
pub fn caption(size_mb: f64) -> String {
    format!("Here is your video (about {size_mb:.1} MB)")
}

/// Run the delivery strategy for an admitted artifact.
pub async fn deliver(
    notifier: &dyn Notifier,
    chat_id: i64,
    artifact: &Path,
    caption: &str,
) -> DeliveryOutcome {
    let primary_error = match notifier.send_rich_media(chat_id, artifact, caption).await {
        Ok(()) => return DeliveryOutcome::Delivered,
        Err(SendError::Timeout) => {
            warn!(
                path = %artifact.display(),
                "Video upload timed out client-side; assuming the server completes it"
            );
            return DeliveryOutcome::DeliveredUnconfirmed;
        }
        Err(e) => e,
    };

    warn!(error = %primary_error, "Video send failed, retrying as document");
    match notifier.send_generic_file(chat_id, artifact, caption).await {
        Ok(()) => {
            info!(path = %artifact.display(), "Sent as document");
            DeliveryOutcome::DeliveredAsFallback { primary_error }
        }
        Err(fallback_error) => {
            warn!(error = %fallback_error, "Document send failed");
            DeliveryOutcome::Failed {
                primary_error,
                fallback_error,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Notifier with scripted results for the two file sends.
    struct ScriptedNotifier {
        rich: Result<(), SendError>,
        generic: Result<(), SendError>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl ScriptedNotifier {
        fn new(rich: Result<(), SendError>, generic: Result<(), SendError>) -> Self {
            Self {
                rich,
                generic,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Notifier for ScriptedNotifier {
        async fn send_rich_media(&self, _: i64, _: &Path, _: &str) -> Result<(), SendError> {
            self.calls.lock().push("rich");
            self.rich.clone()
        }

        async fn send_generic_file(&self, _: i64, _: &Path, _: &str) -> Result<(), SendError> {
            self.calls.lock().push("generic");
            self.generic.clone()
        }

        async fn send_text(&self, _: i64, _: &str) -> Result<(), SendError> {
            self.calls.lock().push("text");
            Ok(())
        }
    }

    fn api_error() -> SendError {
        SendError::Api {
            code: 400,
            description: "Bad Request: wrong file".to_string(),
        }
    }

    #[tokio::test]
    async fn primary_success_skips_fallback() {
        let notifier = ScriptedNotifier::new(Ok(()), Ok(()));
        let outcome = deliver(&notifier, 1, Path::new("/a.mp4"), "c").await;
        assert!(matches!(outcome, DeliveryOutcome::Delivered));
        assert_eq!(*notifier.calls.lock(), vec!["rich"]);
    }

    #[tokio::test]
    async fn timeout_counts_as_delivered_without_fallback() {
        let notifier = ScriptedNotifier::new(Err(SendError::Timeout), Ok(()));
        let outcome = deliver(&notifier, 1, Path::new("/a.mp4"), "c").await;
        assert!(matches!(outcome, DeliveryOutcome::DeliveredUnconfirmed));
        assert_eq!(outcome.status(), JobStatus::Delivered);
        assert!(outcome.detail(40.0, false).contains("timeout"));
        assert_eq!(*notifier.calls.lock(), vec!["rich"]);
    }

    #[tokio::test]
    async fn primary_error_falls_back_to_generic() {
        let notifier = ScriptedNotifier::new(Err(api_error()), Ok(()));
        let outcome = deliver(&notifier, 1, Path::new("/a.mp4"), "c").await;
        assert_eq!(outcome.status(), JobStatus::DeliveredAsFallback);
        assert_eq!(
            outcome.detail(40.0, false),
            "40.0 MB (video send failed: API error 400: Bad Request: wrong file)"
        );
        assert_eq!(*notifier.calls.lock(), vec!["rich", "generic"]);
    }

    #[tokio::test]
    async fn both_failing_is_failed() {
        let notifier =
            ScriptedNotifier::new(Err(api_error()), Err(SendError::Transport("reset".into())));
        let outcome = deliver(&notifier, 1, Path::new("/a.mp4"), "c").await;
        assert_eq!(outcome.status(), JobStatus::Failed);
        assert!(!outcome.is_delivered());
        assert_eq!(
            outcome.detail(40.0, false),
            "upload failed: video: API error 400: Bad Request: wrong file; \
             document: transport error: reset"
        );
    }

    #[tokio::test]
    async fn fallback_timeout_is_not_forgiven() {
        let notifier = ScriptedNotifier::new(Err(api_error()), Err(SendError::Timeout));
        let outcome = deliver(&notifier, 1, Path::new("/a.mp4"), "c").await;
        assert_eq!(outcome.status(), JobStatus::Failed);
    }

    #[test]
    fn details_and_caption_carry_size() {
        assert_eq!(DeliveryOutcome::Delivered.detail(40.04, false), "40.0 MB");
        assert_eq!(DeliveryOutcome::Delivered.detail(12.0, true), "12.0 MB (reused)");
        assert_eq!(caption(40.0), "Here is your video (about 40.0 MB)");
    }
}
