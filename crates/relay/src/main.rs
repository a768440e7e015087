//! Alert relay binary.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use alert_relay::cache::{DedupCache, MemoryCache, RedisCache};
use alert_relay::config::{CacheConfig, LogFormat, RelayArgs, RelayConfig};
use alert_relay::poller::{Collaborators, PollerHandle, PollerSettings};
use alert_relay::server::{build_router, AppState};
use alert_relay::source::AlertmanagerClient;
use notify::TelegramChannel;

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(30);

fn init_tracing(format: LogFormat, verbose: bool) {
    let default_filter = if verbose {
        "alert_relay=debug,notify=debug,info"
    } else {
        "alert_relay=info,notify=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init(),
    }
}

fn build_cache(config: &CacheConfig) -> Result<Arc<dyn DedupCache>> {
    let cache: Arc<dyn DedupCache> = match config {
        CacheConfig::Redis {
            url,
            key_prefix,
            op_timeout,
        } => Arc::new(
            RedisCache::new(url, key_prefix.clone(), *op_timeout)
                .context("Invalid Redis connection settings")?,
        ),
        CacheConfig::Memory => {
            info!("Using in-memory dedup cache; entries are lost on restart");
            Arc::new(MemoryCache::new())
        }
    };
    Ok(cache)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = RelayArgs::parse();
    init_tracing(args.log_format, args.verbose);

    let config = RelayConfig::try_from(args).context("Invalid configuration")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        alertmanager = %config.alertmanager_url,
        "Starting alert relay"
    );

    let source = AlertmanagerClient::new(&config.alertmanager_url, config.source_timeout)
        .context("Failed to create Alertmanager client")?;
    let cache = build_cache(&config.cache)?;
    let notify_client = reqwest::Client::builder()
        .timeout(NOTIFY_TIMEOUT)
        .build()
        .context("Failed to create Telegram HTTP client")?;
    let channel = TelegramChannel::new(&config.telegram_token, &config.chat_id)
        .with_api_base(&config.telegram_api_url)
        .with_client(notify_client);
    info!(
        chat_id = channel.chat_id(),
        receivers = ?config.policy.receivers().collect::<Vec<_>>(),
        severities = ?config.policy.severities().collect::<Vec<_>>(),
        "Telegram notifications configured"
    );

    let poller = PollerHandle::new(
        Collaborators {
            source: Arc::new(source),
            cache: Arc::clone(&cache),
            channel: Arc::new(channel),
        },
        PollerSettings {
            interval: config.poll_interval,
            dedup_ttl: config.dedup_ttl,
            notify_delay: config.notify_delay,
            policy: config.policy.clone(),
        },
    );

    if config.start_on_boot {
        poller.start().await;
    }

    let app = build_router(AppState {
        poller: poller.clone(),
        cache,
    });

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "Control server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Control server failed")?;

    poller.shutdown().await;
    info!("Alert relay stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        () = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}
