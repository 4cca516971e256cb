//! Telegram ingestion: turns incoming chat messages into queued jobs.
//!
//! Access control happens here, before anything reaches the queue.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::messages;
use crate::notify::{Message, Notifier, TelegramNotifier};
use crate::queue::DeliveryMode;
use crate::service::{JobRequest, RelayService};

/// Back-off after a failed `getUpdates` call.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

fn url_regex() -> &'static Regex {
    static URL_REGEX: OnceLock<Regex> = OnceLock::new();
    URL_REGEX.get_or_init(|| Regex::new(r"https?://\S+").unwrap())
}

/// First `http(s)://` URL in `text`.
pub fn extract_url(text: &str) -> Option<&str> {
    url_regex().find(text).map(|m| m.as_str())
}

/// What an incoming text asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `/start`
    Welcome,
    /// A job to submit.
    Submit { locator: String, mode: DeliveryMode },
    /// Nothing usable in the message.
    NoLink,
}

/// Interpret a message text.
///
/// - `/start` greets.
/// - `/keep <url>` downloads without sending.
/// - `/send <path>` sends a file from the download directory.
/// - Any other slash command is submitted as an invalid job.
/// - Plain text is searched for a link.
pub fn parse_request(text: &str) -> Request {
    let text = text.trim();

    let Some(command_line) = text.strip_prefix('/') else {
        return match extract_url(text) {
            Some(url) => Request::Submit {
                locator: url.to_string(),
                mode: DeliveryMode::Standard,
            },
            None => Request::NoLink,
        };
    };

    let (command, rest) = command_line
        .split_once(char::is_whitespace)
        .unwrap_or((command_line, ""));
    // Commands in groups carry the bot name: /start@relay_bot
    let command = command.split('@').next().unwrap_or(command);
    let rest = rest.trim();

    match command {
        "start" | "help" => Request::Welcome,
        "keep" => match extract_url(rest) {
            Some(url) => Request::Submit {
                locator: url.to_string(),
                mode: DeliveryMode::DownloadOnly,
            },
            None => Request::NoLink,
        },
        "send" if !rest.is_empty() => Request::Submit {
            locator: rest.to_string(),
            mode: DeliveryMode::UploadOnly,
        },
        "send" => Request::NoLink,
        _ => Request::Submit {
            locator: text.to_string(),
            mode: DeliveryMode::Invalid,
        },
    }
}

/// Handles messages for one bot.
pub struct Bot {
    service: Arc<RelayService>,
    replies: Arc<dyn Notifier>,
    allowed_user_ids: Vec<i64>,
    upload_limit_mb: u64,
}

impl Bot {
    pub fn new(
        service: Arc<RelayService>,
        replies: Arc<dyn Notifier>,
        allowed_user_ids: Vec<i64>,
        upload_limit_mb: u64,
    ) -> Self {
        Self {
            service,
            replies,
            allowed_user_ids,
            upload_limit_mb,
        }
    }

    fn is_authorized(&self, message: &Message) -> bool {
        message
            .from
            .as_ref()
            .is_some_and(|user| self.allowed_user_ids.contains(&user.id))
    }

    /// Handle one incoming message.
    pub async fn handle_message(&self, message: &Message) {
        let Some(text) = message.text.as_deref() else {
            return;
        };
        let chat_id = message.chat.id;

        if !self.is_authorized(message) {
            warn!(
                chat_id,
                user_id = message.from.as_ref().map(|u| u.id),
                "Unauthorized message"
            );
            self.reply(chat_id, messages::UNAUTHORIZED).await;
            return;
        }

        match parse_request(text) {
            Request::Welcome => {
                self.reply(chat_id, &messages::welcome(self.upload_limit_mb))
                    .await;
            }
            Request::NoLink => self.reply(chat_id, messages::INVALID_URL).await,
            Request::Submit { locator, mode } => {
                let from = message.from.as_ref();
                let request = JobRequest::new(locator, chat_id)
                    .with_submitter(
                        from.map(|u| u.id),
                        from.and_then(|u| u.username.clone()),
                    )
                    .with_mode(mode);
                let receipt = self.service.submit(request);
                info!(
                    entry_id = receipt.entry_id,
                    position = receipt.position,
                    ?mode,
                    "Job submitted"
                );
                self.reply(chat_id, &messages::queued(receipt.position))
                    .await;
            }
        }
    }

    async fn reply(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.replies.send_text(chat_id, text).await {
            warn!(chat_id, error = %e, "Failed to send reply");
        }
    }

    /// Long-poll `getUpdates` until cancelled.
    pub async fn run(self, api: Arc<TelegramNotifier>, cancellation_token: CancellationToken) {
        info!("Telegram polling started");
        let mut offset: Option<i64> = None;

        loop {
            let updates = tokio::select! {
                _ = cancellation_token.cancelled() => break,
                result = api.get_updates(offset) => result,
            };

            match updates {
                Ok(updates) => {
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        if let Some(message) = update.message.as_ref() {
                            self.handle_message(message).await;
                        }
                    }
                }
                Err(e) if e.is_timeout() => debug!("Long poll timed out"),
                Err(e) => {
                    warn!(error = %e, "getUpdates failed, backing off");
                    tokio::select! {
                        _ = cancellation_token.cancelled() => break,
                        _ = tokio::time::sleep(POLL_ERROR_BACKOFF) => {}
                    }
                }
            }
        }

        info!("Telegram polling stopped");
    }
}
