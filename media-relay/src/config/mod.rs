//! Runtime configuration.
//!
//! Everything is read from environment variables (optionally seeded from a
//! `.env` file by the binary). Each setting has a default so the relay starts
//! with only `BOT_TOKEN` set.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::logging::DEFAULT_LOG_FILTER;
use crate::policy::SizePolicy;
use crate::{Error, Result};

/// Telegram Bot API connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token issued by @BotFather.
    pub bot_token: String,
    /// Bot API base URL. Points at a self-hosted server for high-capacity uploads.
    pub api_base_url: String,
    /// Client-side timeout for file uploads, in seconds.
    pub upload_timeout_secs: u64,
    /// Long-poll timeout passed to `getUpdates`, in seconds.
    pub poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_base_url: "https://api.telegram.org".to_string(),
            upload_timeout_secs: 300,
            poll_timeout_secs: 30,
        }
    }
}

/// Dashboard server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// External fetch tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Path to the `yt-dlp` binary.
    pub binary_path: String,
    /// Extra arguments appended to every download invocation.
    pub extra_args: Vec<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            binary_path: "yt-dlp".to_string(),
            extra_args: Vec::new(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub dashboard: DashboardConfig,
    pub fetcher: FetcherConfig,
    pub policy: SizePolicy,
    /// Where fetched artifacts are written.
    pub download_dir: PathBuf,
    /// Delete artifacts once a job is finished with them.
    pub delete_after_send: bool,
    /// Telegram user ids allowed to submit jobs. Empty means nobody.
    pub allowed_user_ids: Vec<i64>,
    /// Number of ledger entries kept for observers.
    pub ledger_capacity: usize,
    /// Number of formatted log lines kept for observers.
    pub log_buffer_limit: usize,
    /// Directory for rolling log files.
    pub log_dir: PathBuf,
    /// Initial tracing filter directive when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            telegram: TelegramConfig::default(),
            dashboard: DashboardConfig::default(),
            fetcher: FetcherConfig::default(),
            policy: SizePolicy::default(),
            download_dir: PathBuf::from("downloads"),
            delete_after_send: false,
            allowed_user_ids: Vec::new(),
            ledger_capacity: 100,
            log_buffer_limit: 200,
            log_dir: PathBuf::from("logs"),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration using an arbitrary key lookup.
    ///
    /// Unset or blank variables keep their defaults; malformed values are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(token) = get("BOT_TOKEN") {
            config.telegram.bot_token = token.trim().to_string();
        }
        if let Some(base) = get("TELEGRAM_BOT_API_BASE_URL") {
            config.telegram.api_base_url = base.trim().trim_end_matches('/').to_string();
        }
        if let Some(v) = get("TELEGRAM_REQUEST_TIMEOUT_SECS") {
            config.telegram.upload_timeout_secs = parse_var("TELEGRAM_REQUEST_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("TELEGRAM_POLL_TIMEOUT_SECS") {
            config.telegram.poll_timeout_secs = parse_var("TELEGRAM_POLL_TIMEOUT_SECS", &v)?;
        }

        if let Some(v) = get("MAX_DOWNLOAD_MB") {
            config.policy.download_cap_mb = parse_var("MAX_DOWNLOAD_MB", &v)?;
        }
        if let Some(v) = get("STANDARD_UPLOAD_LIMIT_MB") {
            config.policy.standard_upload_limit_mb = parse_var("STANDARD_UPLOAD_LIMIT_MB", &v)?;
        }
        if let Some(v) = get("LOCAL_BOT_API_UPLOAD_LIMIT_MB") {
            config.policy.high_capacity_upload_limit_mb =
                parse_var("LOCAL_BOT_API_UPLOAD_LIMIT_MB", &v)?;
        }
        if let Some(v) = get("TELEGRAM_BOT_API_ENABLED") {
            config.policy.high_capacity = parse_bool("TELEGRAM_BOT_API_ENABLED", &v)?;
        }

        if let Some(dir) = get("DOWNLOAD_DIR") {
            config.download_dir = PathBuf::from(dir.trim());
        }
        if let Some(v) = get("DELETE_AFTER_SEND") {
            config.delete_after_send = parse_bool("DELETE_AFTER_SEND", &v)?;
        }
        if let Some(v) = get("ALLOWED_USER_IDS") {
            config.allowed_user_ids = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| parse_var("ALLOWED_USER_IDS", s))
                .collect::<Result<Vec<i64>>>()?;
        }

        if let Some(v) = get("LEDGER_CAPACITY") {
            config.ledger_capacity = parse_var("LEDGER_CAPACITY", &v)?;
        }
        if let Some(v) = get("LOG_BUFFER_LIMIT") {
            config.log_buffer_limit = parse_var("LOG_BUFFER_LIMIT", &v)?;
        }
        if let Some(dir) = get("LOG_DIR") {
            config.log_dir = PathBuf::from(dir.trim());
        }
        if let Some(filter) = get("LOG_FILTER") {
            config.log_filter = filter;
        }

        if let Some(v) = get("WEB_APP_ENABLED") {
            config.dashboard.enabled = parse_bool("WEB_APP_ENABLED", &v)?;
        }
        if let Some(host) = get("WEB_APP_HOST") {
            config.dashboard.bind_address = host.trim().to_string();
        }
        if let Some(v) = get("WEB_APP_PORT") {
            config.dashboard.port = parse_var("WEB_APP_PORT", &v)?;
        }

        if let Some(path) = get("YTDLP_PATH") {
            config.fetcher.binary_path = path.trim().to_string();
        }
        if let Some(args) = get("YTDLP_EXTRA_ARGS") {
            config.fetcher.extra_args = args.split_whitespace().map(str::to_string).collect();
        }

        Ok(config)
    }

    /// Check settings the binary cannot run without.
    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.is_empty() {
            return Err(Error::config("BOT_TOKEN is not set"));
        }
        if self.ledger_capacity == 0 {
            return Err(Error::config("LEDGER_CAPACITY must be at least 1"));
        }
        if self.log_buffer_limit == 0 {
            return Err(Error::config("LOG_BUFFER_LIMIT must be at least 1"));
        }
        if self.policy.download_cap_mb == 0 {
            return Err(Error::config("MAX_DOWNLOAD_MB must be at least 1"));
        }
        url::Url::parse(&self.telegram.api_base_url).map_err(|e| {
            Error::config(format!(
                "TELEGRAM_BOT_API_BASE_URL is not a valid URL ({}): {e}",
                self.telegram.api_base_url
            ))
        })?;
        Ok(())
    }

    pub fn is_user_allowed(&self, user_id: i64) -> bool {
        self.allowed_user_ids.contains(&user_id)
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| Error::config(format!("{name} has invalid value {value:?}: {e}")))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::config(format!(
            "{name} has invalid boolean value {other:?}"
        ))),
    }
}
