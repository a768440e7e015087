//! In-process dedup cache.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::DedupCache;
use crate::alert::AlertSnapshot;
use crate::error::CacheError;

/// Dedup cache held in process memory.
///
/// Entries do not survive a restart, so after one every firing alert is
/// announced again. Useful for local runs without Redis.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (AlertSnapshot, Instant)>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of unexpired entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .await
            .values()
            .filter(|(_, expires_at)| *expires_at > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl DedupCache for MemoryCache {
    async fn exists(&self, fingerprint: &str) -> Result<bool, CacheError> {
        Ok(self.get(fingerprint).await?.is_some())
    }

    async fn put(
        &self,
        fingerprint: &str,
        snapshot: &AlertSnapshot,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        // Resolved alerts are never read again; sweep them here.
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        entries.insert(fingerprint.to_string(), (snapshot.clone(), now + ttl));
        Ok(())
    }

    async fn get(&self, fingerprint: &str) -> Result<Option<AlertSnapshot>, CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        let live = entries
            .get(fingerprint)
            .map(|(snapshot, expires_at)| (*expires_at > now).then(|| snapshot.clone()));

        match live {
            Some(Some(snapshot)) => Ok(Some(snapshot)),
            Some(None) => {
                entries.remove(fingerprint);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn ping(&self) -> bool {
        true
    }
}
