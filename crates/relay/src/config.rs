//! Startup configuration: CLI flags with environment fallbacks.
//!
//! [`RelayArgs`] is what clap parses; [`RelayConfig`] is the validated form the
//! rest of the relay consumes. Conversion fails fast on anything missing or
//! out of range.

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::time::Duration;

use crate::cache::RedisCache;
use crate::error::ConfigError;
use crate::policy::EligibilityPolicy;

/// Where dedup entries are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheBackend {
    Redis,
    /// Process memory; entries are lost on restart.
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Alert relay - forwards new Alertmanager alerts to a Telegram chat.
#[derive(Debug, Clone, Parser)]
#[command(name = "alert-relay")]
#[command(about = "Relay firing Alertmanager alerts to a Telegram chat")]
#[command(version)]
pub struct RelayArgs {
    /// Alertmanager base URL
    #[arg(long, env = "PROMETHEUS_URL")]
    pub alertmanager_url: String,

    /// Alert source request timeout in seconds
    #[arg(long, env = "SOURCE_TIMEOUT_SECS", default_value = "30")]
    pub source_timeout_secs: u64,

    /// Dedup cache backend
    #[arg(long, env = "CACHE_BACKEND", value_enum, default_value = "redis")]
    pub cache_backend: CacheBackend,

    /// Redis host (required with the redis backend)
    #[arg(long, env = "REDIS_SERVER")]
    pub redis_host: Option<String>,

    #[arg(long, env = "REDIS_PORT", default_value = "6379")]
    pub redis_port: u16,

    #[arg(long, env = "REDIS_DB", default_value = "0")]
    pub redis_db: u32,

    /// Prefix prepended to every dedup key
    #[arg(long, env = "CACHE_KEY_PREFIX", default_value = "")]
    pub cache_key_prefix: String,

    /// Per-operation cache timeout in seconds
    #[arg(long, env = "CACHE_TIMEOUT_SECS", default_value = "5")]
    pub cache_timeout_secs: u64,

    /// Telegram bot token
    #[arg(long, env = "TELEGRAM_TOKEN", hide_env_values = true)]
    pub telegram_token: String,

    /// Telegram Bot API base URL
    #[arg(long, env = "TELEGRAM_API_URL", default_value = notify::channels::telegram::DEFAULT_API_BASE)]
    pub telegram_api_url: String,

    /// Destination chat id (group ids are negative)
    #[arg(long, env = "CHAT_ID", allow_hyphen_values = true)]
    pub chat_id: String,

    /// Seconds between poll cycles
    #[arg(long, env = "POLL_INTERVAL", default_value = "60")]
    pub poll_interval_secs: u64,

    /// Seconds a notified alert stays suppressed
    #[arg(long, env = "DEDUP_TTL_SECS", default_value = "43200")]
    pub dedup_ttl_secs: u64,

    /// Pause between notification attempts, in milliseconds
    #[arg(long, env = "NOTIFY_DELAY_MS", default_value = "1000")]
    pub notify_delay_ms: u64,

    /// Receivers whose alerts are announced
    #[arg(
        long,
        env = "RECEIVER_ALLOW_LIST",
        value_delimiter = ',',
        default_value = "default"
    )]
    pub receivers: Vec<String>,

    /// Severities that are announced
    #[arg(
        long,
        env = "SEVERITY_ALLOW_LIST",
        value_delimiter = ',',
        default_value = "disaster,critical,warning"
    )]
    pub severities: Vec<String>,

    /// Control server listen address
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8000")]
    pub listen_addr: SocketAddr,

    /// Start the poll loop without waiting for /start
    #[arg(long, env = "START_ON_BOOT")]
    pub start_on_boot: bool,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Cache connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheConfig {
    Redis {
        url: String,
        key_prefix: String,
        op_timeout: Duration,
    },
    Memory,
}

/// Validated relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub alertmanager_url: String,
    pub source_timeout: Duration,
    pub cache: CacheConfig,
    pub telegram_token: String,
    pub telegram_api_url: String,
    pub chat_id: String,
    pub poll_interval: Duration,
    pub dedup_ttl: Duration,
    pub notify_delay: Duration,
    pub policy: EligibilityPolicy,
    pub listen_addr: SocketAddr,
    pub start_on_boot: bool,
}

impl TryFrom<RelayArgs> for RelayConfig {
    type Error = ConfigError;

    fn try_from(args: RelayArgs) -> Result<Self, Self::Error> {
        let alertmanager_url = http_url("alertmanager url", &args.alertmanager_url)?;
        let telegram_api_url = http_url("telegram api url", &args.telegram_api_url)?;
        let telegram_token = non_empty("telegram token", &args.telegram_token)?;
        let chat_id = non_empty("chat id", &args.chat_id)?;

        let poll_interval = Duration::from_secs(positive("poll interval", args.poll_interval_secs)?);
        let dedup_ttl = Duration::from_secs(positive("dedup ttl", args.dedup_ttl_secs)?);
        let source_timeout =
            Duration::from_secs(positive("source timeout", args.source_timeout_secs)?);

        let receivers = allow_list("receivers", &args.receivers)?;
        let severities = allow_list("severities", &args.severities)?;

        let cache = match args.cache_backend {
            CacheBackend::Memory => CacheConfig::Memory,
            CacheBackend::Redis => {
                let host = non_empty("redis host", args.redis_host.as_deref().unwrap_or_default())?;
                let op_timeout =
                    Duration::from_secs(positive("cache timeout", args.cache_timeout_secs)?);
                CacheConfig::Redis {
                    url: RedisCache::url(&host, args.redis_port, args.redis_db),
                    key_prefix: args.cache_key_prefix,
                    op_timeout,
                }
            }
        };

        Ok(Self {
            alertmanager_url,
            source_timeout,
            cache,
            telegram_token,
            telegram_api_url,
            chat_id,
            poll_interval,
            dedup_ttl,
            notify_delay: Duration::from_millis(args.notify_delay_ms),
            policy: EligibilityPolicy::new(receivers, severities),
            listen_addr: args.listen_addr,
            start_on_boot: args.start_on_boot,
        })
    }
}

fn non_empty(field: &'static str, value: &str) -> Result<String, ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::Empty(field));
    }
    Ok(value.to_string())
}

fn http_url(field: &'static str, value: &str) -> Result<String, ConfigError> {
    let value = non_empty(field, value)?;
    if !(value.starts_with("http://") || value.starts_with("https://")) {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("{value:?} is not an http(s) URL"),
        });
    }
    Ok(value)
}

fn positive(field: &'static str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Zero { field });
    }
    Ok(value)
}

fn allow_list(field: &'static str, values: &[String]) -> Result<Vec<String>, ConfigError> {
    let entries: Vec<String> = values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();

    if entries.is_empty() {
        return Err(ConfigError::Empty(field));
    }
    Ok(entries)
}
