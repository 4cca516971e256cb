//! Notification channel used to deliver artifacts and status texts.
//!
//! The worker only sees the [`Notifier`] trait; [`TelegramNotifier`] is the
//! production implementation.

mod telegram;

pub use telegram::{Chat, Message, TelegramNotifier, Update, User, truncate_message};

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

/// Why a send did not go through.
#[derive(Debug, Clone, Error)]
pub enum SendError {
    /// The client gave up waiting. The server may still complete the upload.
    #[error("request timed out")]
    Timeout,

    /// The API answered with an error.
    #[error("API error {code}: {description}")]
    Api { code: u16, description: String },

    /// Connection, protocol or decoding failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The artifact could not be read.
    #[error("cannot read artifact: {0}")]
    Io(String),
}

impl SendError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, SendError::Timeout)
    }
}

impl From<reqwest::Error> for SendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SendError::Timeout
        } else {
            SendError::Transport(err.to_string())
        }
    }
}

/// Outbound channel towards the submitter's chat.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send the artifact as playable media (primary delivery).
    async fn send_rich_media(
        &self,
        chat_id: i64,
        artifact: &Path,
        caption: &str,
    ) -> Result<(), SendError>;

    /// Send the artifact as a plain file (fallback delivery).
    async fn send_generic_file(
        &self,
        chat_id: i64,
        artifact: &Path,
        caption: &str,
    ) -> Result<(), SendError>;

    /// Send a text message.
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), SendError>;
}
