//! Telegram Bot API client.
//!
//! Uploads go through `sendVideo` / `sendDocument` as multipart requests,
//! texts through `sendMessage`. The base URL is configurable so a
//! self-hosted Bot API server (2 GB uploads) can be used instead of the
//! public one. Handles 429 rate limits on JSON calls by respecting the
//! `parameters.retry_after` field returned in the response body.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use super::{Notifier, SendError};
use crate::config::TelegramConfig;
use crate::utils::http_client;

/// Maximum number of retries for rate-limited requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Telegram `sendMessage` text limit (UTF-8 characters).
const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// Extra time granted to a long poll on top of the server-side timeout.
const POLL_GRACE: Duration = Duration::from_secs(10);

/// Incoming update from `getUpdates`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<u16>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

/// An API-level failure, with the server's back-off hint if any.
struct ApiFailure {
    error: SendError,
    retry_after: Option<Duration>,
}

impl From<SendError> for ApiFailure {
    fn from(error: SendError) -> Self {
        Self {
            error,
            retry_after: None,
        }
    }
}

/// Telegram Bot API notifier.
pub struct TelegramNotifier {
    client: Client,
    base_url: String,
    bot_token: String,
    poll_timeout: Duration,
}

impl TelegramNotifier {
    /// Create a new notifier. The upload timeout applies to every request
    /// except long polls.
    pub fn new(config: &TelegramConfig) -> crate::Result<Self> {
        let client = http_client::build_client(Duration::from_secs(config.upload_timeout_secs))?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
            poll_timeout: Duration::from_secs(config.poll_timeout_secs),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.bot_token, method)
    }

    /// Decode a Bot API response envelope.
    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiFailure> {
        let status = response.status();
        let body = response.bytes().await.map_err(SendError::from)?;

        let envelope: ApiResponse<T> = match serde_json::from_slice(&body) {
            Ok(envelope) => envelope,
            Err(_) => {
                return Err(SendError::Api {
                    code: status.as_u16(),
                    description: String::from_utf8_lossy(&body).trim().to_string(),
                }
                .into());
            }
        };

        if envelope.ok
            && let Some(result) = envelope.result
        {
            return Ok(result);
        }

        Err(ApiFailure {
            error: SendError::Api {
                code: envelope.error_code.unwrap_or(status.as_u16()),
                description: envelope
                    .description
                    .unwrap_or_else(|| status.to_string()),
            },
            retry_after: envelope
                .parameters
                .and_then(|p| p.retry_after)
                .map(Duration::from_secs),
        })
    }

    /// JSON call with rate limit handling.
    async fn call_json<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: &serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<T, SendError> {
        let url = self.method_url(method);
        let mut attempts = 0;

        loop {
            attempts += 1;

            let mut request = self.client.post(&url).json(payload);
            if let Some(timeout) = timeout {
                request = request.timeout(timeout);
            }
            let response = request.send().await?;
            let rate_limited = response.status().as_u16() == 429;

            match Self::decode::<T>(response).await {
                Ok(result) => return Ok(result),
                Err(failure) if rate_limited && attempts < MAX_RATE_LIMIT_RETRIES => {
                    let wait_duration = failure.retry_after.unwrap_or(Duration::from_secs(1));
                    debug!(
                        "Telegram rate limited (429), waiting {:?} before retry (attempt {}/{})",
                        wait_duration, attempts, MAX_RATE_LIMIT_RETRIES
                    );
                    tokio::time::sleep(wait_duration).await;
                }
                Err(failure) => {
                    warn!(method, error = %failure.error, "Telegram call failed");
                    return Err(failure.error);
                }
            }
        }
    }

    /// Upload a local file under `field` with `method`.
    async fn send_file(
        &self,
        method: &str,
        field: &'static str,
        chat_id: i64,
        artifact: &Path,
        caption: &str,
        extra: &[(&'static str, &'static str)],
    ) -> Result<(), SendError> {
        let file = tokio::fs::File::open(artifact)
            .await
            .map_err(|e| SendError::Io(format!("{}: {e}", artifact.display())))?;
        let length = file
            .metadata()
            .await
            .map_err(|e| SendError::Io(format!("{}: {e}", artifact.display())))?
            .len();
        let file_name = artifact
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video.mp4".to_string());

        let mut form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", truncate_message(caption, 1024));
        for (key, value) in extra {
            form = form.text(*key, *value);
        }
        let form = form.part(field, Part::stream_with_length(file, length).file_name(file_name));

        debug!(method, chat_id, bytes = length, "Uploading file");
        let response = self
            .client
            .post(self.method_url(method))
            .multipart(form)
            .send()
            .await?;

        Self::decode::<serde_json::Value>(response)
            .await
            .map(|_| ())
            .map_err(|failure| failure.error)
    }

    /// Long-poll for new updates starting at `offset`.
    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, SendError> {
        let mut payload = json!({
            "timeout": self.poll_timeout.as_secs(),
            "allowed_updates": ["message"],
        });
        if let Some(offset) = offset {
            payload["offset"] = json!(offset);
        }
        self.call_json("getUpdates", &payload, Some(self.poll_timeout + POLL_GRACE))
            .await
    }

    /// Identify the bot; used as a startup connectivity check.
    pub async fn get_me(&self) -> Result<User, SendError> {
        self.call_json("getMe", &json!({}), None).await
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_rich_media(
        &self,
        chat_id: i64,
        artifact: &Path,
        caption: &str,
    ) -> Result<(), SendError> {
        self.send_file(
            "sendVideo",
            "video",
            chat_id,
            artifact,
            caption,
            &[("supports_streaming", "true")],
        )
        .await
    }

    async fn send_generic_file(
        &self,
        chat_id: i64,
        artifact: &Path,
        caption: &str,
    ) -> Result<(), SendError> {
        self.send_file("sendDocument", "document", chat_id, artifact, caption, &[])
            .await
    }

    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), SendError> {
        let payload = json!({
            "chat_id": chat_id,
            "text": truncate_message(text, TELEGRAM_MESSAGE_LIMIT),
        });
        self.call_json::<serde_json::Value>("sendMessage", &payload, None)
            .await
            .map(|_| ())
    }
}

/// Truncate a message to fit within the Telegram character limit.
pub fn truncate_message(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let suffix = "\n\n[truncated]";
    let budget = limit.saturating_sub(suffix.len());
    let truncated: String = text.chars().take(budget).collect();
    format!("{truncated}{suffix}")
}
