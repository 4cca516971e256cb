use std::{sync::OnceLock, time::Duration};

use tracing::debug;

/// Install the process-wide rustls crypto provider once.
///
/// reqwest is built with `rustls-tls-*-no-provider`, so a provider must be
/// installed before the first client is created.
pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate installed it first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Build a client with the given request timeout.
pub fn build_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    install_rustls_provider();
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(15))
        .user_agent(concat!("media-relay/", env!("CARGO_PKG_VERSION")))
        .build()
}
