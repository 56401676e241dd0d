// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process plumbing: logging, signal handling, and client assembly.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use murmur_cache::MessageCache;
use murmur_config::MurmurConfig;
use murmur_core::{MurmurError, StaticCredentials};
use murmur_http::RestClient;
use murmur_stomp::StompTransport;
use murmur_sync::{SyncClient, SyncSettings};

/// How long commands wait for the first handshake.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Install the global tracing subscriber. `RUST_LOG` wins over the
/// configured level.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("murmur={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Returns a token that is cancelled on Ctrl+C or SIGTERM.
pub fn install_signal_handler() -> Result<CancellationToken, MurmurError> {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    #[cfg(unix)]
    let mut sigterm = {
        use tokio::signal::unix::{SignalKind, signal};
        signal(SignalKind::terminate())
            .map_err(|e| MurmurError::Internal(format!("failed to install SIGTERM handler: {e}")))?
    };

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        tokio::select! {
            _ = ctrl_c => info!("received SIGINT (Ctrl+C), shutting down"),
            _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, shutting down");
        }

        token_clone.cancel();
        debug!("signal handler completed");
    });

    Ok(token)
}

/// Build a sync client wired to the real STOMP transport and REST API.
pub fn build_client(config: &MurmurConfig) -> Result<SyncClient, MurmurError> {
    let credentials = Arc::new(StaticCredentials::new(config.auth.access_token.clone()));
    let transport = Arc::new(StompTransport::new(config.server.ws_url.clone()));
    let rest = Arc::new(RestClient::new(&config.server.api_base_url, credentials.clone())?);

    let settings = SyncSettings::from(config);
    let cache = Arc::new(match settings.account_id {
        Some(account_id) => MessageCache::with_account(account_id),
        None => MessageCache::new(),
    });

    Ok(SyncClient::builder(transport, rest.clone(), credentials)
        .mutations(rest)
        .cache(cache)
        .settings(settings)
        .build())
}

/// Build, start, and wait for the first handshake.
pub async fn connect(config: &MurmurConfig) -> Result<SyncClient, MurmurError> {
    if config.auth.access_token.is_none() {
        return Err(MurmurError::Config(
            "no access token configured; set auth.access_token or MURMUR_AUTH_ACCESS_TOKEN".to_string(),
        ));
    }
    let client = build_client(config)?;
    client.start().await?;
    if let Err(e) = client.wait_until_connected(CONNECT_TIMEOUT).await {
        let _ = client.shutdown().await;
        return Err(e);
    }
    info!(url = %config.server.ws_url, "connected");
    Ok(client)
}
