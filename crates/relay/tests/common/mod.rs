//! Shared fakes for the relay integration tests.

#![allow(dead_code)]

use alert_relay::alert::{AlertSnapshot, RawAlert};
use alert_relay::cache::{DedupCache, MemoryCache};
use alert_relay::error::{CacheError, SourceError};
use alert_relay::poller::{Collaborators, PollerSettings};
use alert_relay::source::AlertSource;
use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use notify::{ChannelError, NotifyChannel};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::Instant;

// =============================================================================
// Alert fixtures
// =============================================================================

pub fn firing(fingerprint: &str, severity: &str, receivers: &[&str]) -> RawAlert {
    json!({
        "labels": { "alertname": "HighLatency", "severity": severity },
        "annotations": { "description": format!("alert {fingerprint} is firing") },
        "startsAt": "2024-05-01T10:15:30.123Z",
        "receivers": receivers,
        "fingerprint": fingerprint,
    })
}

pub fn critical(fingerprint: &str) -> RawAlert {
    firing(fingerprint, "critical", &["default"])
}

// =============================================================================
// Alert source
// =============================================================================

/// In-process source whose alert set and availability can be changed between cycles.
#[derive(Default)]
pub struct ScriptedSource {
    alerts: Mutex<Vec<RawAlert>>,
    failing: AtomicBool,
    pub calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn with_alerts(alerts: Vec<RawAlert>) -> Arc<Self> {
        let source = Self::default();
        *source.alerts.lock().unwrap() = alerts;
        Arc::new(source)
    }

    pub fn set_alerts(&self, alerts: Vec<RawAlert>) {
        *self.alerts.lock().unwrap() = alerts;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl AlertSource for ScriptedSource {
    async fn fetch(&self) -> Result<Vec<RawAlert>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::Status {
                status: 503,
                body: "alertmanager is restarting".to_string(),
            });
        }
        Ok(self.alerts.lock().unwrap().clone())
    }
}

// =============================================================================
// Notification channels
// =============================================================================

/// Records every message; fails for messages containing `fail_on`, or for
/// every message when rate limited.
#[derive(Default)]
pub struct RecordingChannel {
    pub sent: Mutex<Vec<String>>,
    /// When each send attempt arrived, successful or not.
    pub attempts: Mutex<Vec<Instant>>,
    fail_on: Option<String>,
    retry_after_secs: Option<u64>,
}

impl RecordingChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_on(needle: &str) -> Arc<Self> {
        Arc::new(Self {
            fail_on: Some(needle.to_string()),
            ..Self::default()
        })
    }

    pub fn rate_limited(retry_after_secs: u64) -> Arc<Self> {
        Arc::new(Self {
            retry_after_secs: Some(retry_after_secs),
            ..Self::default()
        })
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Time between consecutive send attempts.
    pub fn gaps(&self) -> Vec<Duration> {
        self.attempts
            .lock()
            .unwrap()
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .collect()
    }
}

#[async_trait]
impl NotifyChannel for RecordingChannel {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, message: &str) -> Result<(), ChannelError> {
        self.attempts.lock().unwrap().push(Instant::now());

        if let Some(retry_after_secs) = self.retry_after_secs {
            return Err(ChannelError::RateLimited { retry_after_secs });
        }
        if let Some(needle) = &self.fail_on {
            if message.contains(needle.as_str()) {
                return Err(ChannelError::Api {
                    status: 400,
                    description: "Bad Request: chat not found".to_string(),
                });
            }
        }
        self.sent.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

// =============================================================================
// Caches
// =============================================================================

/// A cache whose backend is down.
pub struct UnavailableCache;

#[async_trait]
impl DedupCache for UnavailableCache {
    async fn exists(&self, _fingerprint: &str) -> Result<bool, CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn put(
        &self,
        _fingerprint: &str,
        _snapshot: &AlertSnapshot,
        _ttl: Duration,
    ) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn get(&self, _fingerprint: &str) -> Result<Option<AlertSnapshot>, CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn ping(&self) -> bool {
        false
    }
}

/// Answers pings and reads but every write fails.
#[derive(Default)]
pub struct ReadOnlyCache {
    pub inner: MemoryCache,
}

#[async_trait]
impl DedupCache for ReadOnlyCache {
    async fn exists(&self, fingerprint: &str) -> Result<bool, CacheError> {
        self.inner.exists(fingerprint).await
    }

    async fn put(
        &self,
        _fingerprint: &str,
        _snapshot: &AlertSnapshot,
        _ttl: Duration,
    ) -> Result<(), CacheError> {
        Err(CacheError::Timeout(5))
    }

    async fn get(&self, fingerprint: &str) -> Result<Option<AlertSnapshot>, CacheError> {
        self.inner.get(fingerprint).await
    }

    async fn ping(&self) -> bool {
        true
    }
}

/// Reachable, but lookups for one fingerprint fail.
pub struct FlakyLookupCache {
    pub inner: MemoryCache,
    failing: String,
}

impl FlakyLookupCache {
    pub fn failing_for(fingerprint: &str) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryCache::new(),
            failing: fingerprint.to_string(),
        })
    }
}

#[async_trait]
impl DedupCache for FlakyLookupCache {
    async fn exists(&self, fingerprint: &str) -> Result<bool, CacheError> {
        if fingerprint == self.failing {
            return Err(CacheError::Timeout(5));
        }
        self.inner.exists(fingerprint).await
    }

    async fn put(
        &self,
        fingerprint: &str,
        snapshot: &AlertSnapshot,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.inner.put(fingerprint, snapshot, ttl).await
    }

    async fn get(&self, fingerprint: &str) -> Result<Option<AlertSnapshot>, CacheError> {
        self.inner.get(fingerprint).await
    }

    async fn ping(&self) -> bool {
        true
    }
}

// =============================================================================
// Wiring
// =============================================================================

pub fn collaborators(
    source: Arc<dyn AlertSource>,
    cache: Arc<dyn DedupCache>,
    channel: Arc<dyn NotifyChannel>,
) -> Collaborators {
    Collaborators {
        source,
        cache,
        channel,
    }
}

/// Default policy and TTL, no pause between notifications.
pub fn fast_settings() -> PollerSettings {
    PollerSettings {
        notify_delay: Duration::ZERO,
        ..PollerSettings::default()
    }
}

// =============================================================================
// Mock Alertmanager
// =============================================================================

#[derive(Default)]
pub struct MockAlertmanagerState {
    /// Response body; `None` answers 500.
    pub body: Mutex<Option<Value>>,
    pub requests: AtomicUsize,
}

async fn mock_alerts(State(state): State<Arc<MockAlertmanagerState>>) -> impl IntoResponse {
    state.requests.fetch_add(1, Ordering::SeqCst);
    let body = state.body.lock().unwrap().clone();
    match body {
        Some(body) => (StatusCode::OK, Json(body)),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "status": "error", "error": "storage unavailable" })),
        ),
    }
}

/// Serve `/api/v1/alerts` on a random local port.
pub async fn start_mock_alertmanager(
    body: Option<Value>,
) -> (SocketAddr, Arc<MockAlertmanagerState>) {
    let state = Arc::new(MockAlertmanagerState {
        body: Mutex::new(body),
        requests: AtomicUsize::new(0),
    });

    let app = Router::new()
        .route("/api/v1/alerts", get(mock_alerts))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}
