use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use media_relay::api::{ApiServer, ApiServerConfig, AppState};
use media_relay::bot::Bot;
use media_relay::config::AppConfig;
use media_relay::fetcher::YtDlpFetcher;
use media_relay::ledger::StatusLedger;
use media_relay::logging::{self, LoggingOptions};
use media_relay::notify::TelegramNotifier;
use media_relay::panic_hook;
use media_relay::queue::WorkerSettings;
use media_relay::service::RelayService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("loading configuration")?;

    let (log_buffer, _log_guard) = logging::init_logging(&LoggingOptions {
        log_dir: config.log_dir.clone(),
        filter: config.log_filter.clone(),
        buffer_limit: config.log_buffer_limit,
    })?;
    panic_hook::install();

    config.validate()?;

    let cancel_token = CancellationToken::new();
    logging::start_retention_cleanup(config.log_dir.clone(), cancel_token.child_token());

    let notifier = Arc::new(TelegramNotifier::new(&config.telegram)?);
    match notifier.get_me().await {
        Ok(me) => info!(bot = ?me.username, "Connected to Telegram Bot API"),
        Err(e) => warn!(error = %e, "Bot API check failed, continuing anyway"),
    }

    let fetcher = YtDlpFetcher::new(config.fetcher.clone());
    match fetcher.detect_version() {
        Some(version) => info!(%version, "Using yt-dlp"),
        None => warn!(binary = %config.fetcher.binary_path, "yt-dlp not found; downloads will fail"),
    }

    let ledger = Arc::new(StatusLedger::new(config.ledger_capacity));
    let service = Arc::new(RelayService::new(
        WorkerSettings::from_config(&config),
        ledger,
        Arc::new(fetcher),
        notifier.clone(),
    ));

    info!(
        high_capacity = config.policy.high_capacity,
        upload_limit_mb = config.policy.upload_cap_mb(),
        download_limit_mb = config.policy.download_cap_mb,
        "Starting media relay"
    );

    let dashboard = if config.dashboard.enabled {
        let server = ApiServer::new(
            ApiServerConfig::from(&config.dashboard),
            AppState::new(service.clone(), log_buffer),
            cancel_token.child_token(),
        );
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                tracing::error!(error = %e, "Dashboard stopped");
            }
        }))
    } else {
        None
    };

    let bot = Bot::new(
        service.clone(),
        notifier.clone(),
        config.allowed_user_ids.clone(),
        config.policy.upload_cap_mb(),
    );
    let polling = tokio::spawn(bot.run(notifier, cancel_token.child_token()));

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Shutdown requested");

    cancel_token.cancel();
    service.shutdown().await;
    if let Err(e) = polling.await {
        warn!(error = %e, "Polling task ended abnormally");
    }
    if let Some(dashboard) = dashboard
        && let Err(e) = dashboard.await
    {
        warn!(error = %e, "Dashboard task ended abnormally");
    }

    info!("media-relay stopped");
    Ok(())
}
