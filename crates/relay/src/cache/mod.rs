//! Dedup cache: remembers which alerts have already been announced.
//!
//! Keys are alert fingerprints, values are [`AlertSnapshot`]s, and every entry
//! expires after the retention window. An absent entry means the alert may be
//! announced again.

mod memory;
mod redis_cache;

pub use self::memory::MemoryCache;
pub use self::redis_cache::RedisCache;

use async_trait::async_trait;
use std::time::Duration;

use crate::alert::AlertSnapshot;
use crate::error::CacheError;

/// Default retention window for dedup entries (12 hours).
pub const DEFAULT_DEDUP_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// TTL keyed store shared by the poll loop and the lookup endpoint.
#[async_trait]
pub trait DedupCache: Send + Sync {
    /// Whether an unexpired entry exists for `fingerprint`.
    async fn exists(&self, fingerprint: &str) -> Result<bool, CacheError>;

    /// Store `snapshot` under `fingerprint`, replacing any previous entry.
    async fn put(
        &self,
        fingerprint: &str,
        snapshot: &AlertSnapshot,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// Fetch the snapshot stored for `fingerprint`, if any.
    async fn get(&self, fingerprint: &str) -> Result<Option<AlertSnapshot>, CacheError>;

    /// Liveness probe. Never errors; an unreachable store is `false`.
    async fn ping(&self) -> bool;
}
