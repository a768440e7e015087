//! Redis-backed dedup cache.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::future::Future;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::DedupCache;
use crate::alert::AlertSnapshot;
use crate::error::CacheError;

/// Dedup cache stored in Redis with `SETEX` expiry.
///
/// The connection is opened on first use and then shared; the underlying
/// [`ConnectionManager`] reconnects by itself after a dropped connection. If
/// the first connect fails, the next call tries again.
pub struct RedisCache {
    client: redis::Client,
    connection: OnceCell<ConnectionManager>,
    key_prefix: String,
    op_timeout: Duration,
}

impl RedisCache {
    /// Create a cache for `redis://host:port/db`. Does not connect yet.
    pub fn new(
        url: &str,
        key_prefix: impl Into<String>,
        op_timeout: Duration,
    ) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;

        Ok(Self {
            client,
            connection: OnceCell::new(),
            key_prefix: key_prefix.into(),
            op_timeout,
        })
    }

    /// Build the connection URL for a host, port and database index.
    #[must_use]
    pub fn url(host: &str, port: u16, db: u32) -> String {
        format!("redis://{host}:{port}/{db}")
    }

    fn key(&self, fingerprint: &str) -> String {
        format!("{}{fingerprint}", self.key_prefix)
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        let conn = self
            .connection
            .get_or_try_init(|| async {
                info!(
                    addr = %self.client.get_connection_info().addr,
                    "Connecting to redis"
                );
                ConnectionManager::new(self.client.clone()).await
            })
            .await?;

        Ok(conn.clone())
    }

    /// Bound a cache operation (including a first connect) by the op timeout.
    async fn bounded<T, F>(&self, op: F) -> Result<T, CacheError>
    where
        F: Future<Output = Result<T, CacheError>>,
    {
        tokio::time::timeout(self.op_timeout, op)
            .await
            .map_err(|_| CacheError::Timeout(self.op_timeout.as_secs()))?
    }
}

#[async_trait]
impl DedupCache for RedisCache {
    async fn exists(&self, fingerprint: &str) -> Result<bool, CacheError> {
        self.bounded(async {
            let mut conn = self.connection().await?;
            let found: bool = conn.exists(self.key(fingerprint)).await?;
            Ok(found)
        })
        .await
    }

    async fn put(
        &self,
        fingerprint: &str,
        snapshot: &AlertSnapshot,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let payload = serde_json::to_string(snapshot)?;
        // SETEX rejects a zero expiry.
        let seconds = ttl.as_secs().max(1);

        self.bounded(async {
            let mut conn = self.connection().await?;
            let _: () = conn.set_ex(self.key(fingerprint), payload, seconds).await?;
            debug!(fingerprint, ttl_secs = seconds, "Stored dedup entry");
            Ok(())
        })
        .await
    }

    async fn get(&self, fingerprint: &str) -> Result<Option<AlertSnapshot>, CacheError> {
        let raw: Option<String> = self
            .bounded(async {
                let mut conn = self.connection().await?;
                let value: Option<String> = conn.get(self.key(fingerprint)).await?;
                Ok(value)
            })
            .await?;

        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(CacheError::from)
    }

    async fn ping(&self) -> bool {
        let result = self
            .bounded(async {
                let mut conn = self.connection().await?;
                let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
                Ok(pong)
            })
            .await;

        match result {
            Ok(pong) => pong.eq_ignore_ascii_case("PONG"),
            Err(e) => {
                warn!(error = %e, "Redis ping failed");
                false
            }
        }
    }
}
