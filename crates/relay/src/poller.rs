//! Poll loop driver - fetch, dedup and dispatch on a fixed interval.
//!
//! One cycle runs the whole pipeline for a single alert set:
//!
//! 1. fetch the firing alerts from the source
//! 2. normalize them, dropping malformed records and in-batch duplicates
//! 3. ping the dedup cache
//! 4. for each alert in source order: policy check, cache check, notify,
//!    cache write-back
//!
//! [`PollerHandle`] owns the background task that repeats the cycle and makes
//! sure at most one such task exists.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use notify::{ChannelError, NotifyChannel};

use crate::alert::{normalize, NormalizedAlert};
use crate::cache::{DedupCache, DEFAULT_DEDUP_TTL};
use crate::message::render;
use crate::policy::EligibilityPolicy;
use crate::source::AlertSource;

/// Shared clients the loop talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn AlertSource>,
    pub cache: Arc<dyn DedupCache>,
    pub channel: Arc<dyn NotifyChannel>,
}

/// Timing and policy for the poll loop.
#[derive(Debug, Clone)]
pub struct PollerSettings {
    /// Sleep between the end of one cycle and the next fetch.
    pub interval: Duration,
    /// How long a dispatched alert stays suppressed.
    pub dedup_ttl: Duration,
    /// Pause between successive send attempts, successful or not.
    pub notify_delay: Duration,
    pub policy: EligibilityPolicy,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            dedup_ttl: DEFAULT_DEDUP_TTL,
            notify_delay: Duration::from_secs(1),
            policy: EligibilityPolicy::default(),
        }
    }
}

/// Result of a single poll cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PollCycleResult {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Set when the fetch failed; nothing else ran.
    pub source_error: Option<String>,
    /// Raw alerts returned by the source.
    pub fetched: usize,
    pub normalized: usize,
    pub malformed: usize,
    /// Repeated fingerprints within this batch.
    pub duplicates: usize,
    /// Rejected by the receiver/severity allow-lists.
    pub filtered: usize,
    pub already_notified: usize,
    /// Skipped because the cache could not answer.
    pub cache_skipped: usize,
    pub notify_failed: usize,
    /// Fingerprints announced this cycle, in order.
    pub dispatched: Vec<String>,
    pub errors: Vec<String>,
    /// Cancellation arrived before every alert was handled.
    pub interrupted: bool,
}

impl PollCycleResult {
    fn begin() -> Self {
        Self {
            started_at: Utc::now(),
            ..Self::default()
        }
    }

    fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }
}

/// Run one full cycle.
///
/// Never fails: every problem is logged and recorded in the result. The
/// fetch and the pause between send attempts give up early when `cancel`
/// fires; a notification that has been sent always gets its cache write.
pub async fn run_cycle(
    collaborators: &Collaborators,
    settings: &PollerSettings,
    cancel: &CancellationToken,
) -> PollCycleResult {
    let mut result = PollCycleResult::begin();

    let fetched = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            result.interrupted = true;
            return result.finish();
        }
        fetched = collaborators.source.fetch() => fetched,
    };

    let raw_alerts = match fetched {
        Ok(alerts) => alerts,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to fetch alerts, retrying next cycle");
            result.source_error = Some(e.to_string());
            return result.finish();
        }
    };
    result.fetched = raw_alerts.len();

    let mut seen = HashSet::new();
    let mut alerts: Vec<NormalizedAlert> = Vec::with_capacity(raw_alerts.len());
    for raw in &raw_alerts {
        match normalize(raw) {
            Ok(alert) => {
                result.normalized += 1;
                if seen.insert(alert.fingerprint.clone()) {
                    alerts.push(alert);
                } else {
                    tracing::debug!(fingerprint = %alert.fingerprint, "Duplicate fingerprint in batch");
                    result.duplicates += 1;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed alert");
                result.malformed += 1;
            }
        }
    }

    if alerts.is_empty() {
        tracing::debug!(fetched = result.fetched, "No alerts to process");
        return result.finish();
    }

    let cache_reachable = collaborators.cache.ping().await;
    if !cache_reachable {
        tracing::warn!("Dedup cache unreachable, skipping dispatch this cycle");
    }

    // Pause owed before the next send attempt.
    let mut pause = Duration::ZERO;

    for alert in alerts {
        if cancel.is_cancelled() {
            result.interrupted = true;
            break;
        }

        let fingerprint = alert.fingerprint.as_str();

        if !settings.policy.allows(&alert) {
            tracing::debug!(
                fingerprint,
                severity = %alert.severity,
                receivers = ?alert.receivers,
                "Alert not in allow-lists"
            );
            result.filtered += 1;
            continue;
        }

        if !cache_reachable {
            result.cache_skipped += 1;
            continue;
        }

        let cached = match collaborators.cache.exists(fingerprint).await {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!(fingerprint, error = %e, "Dedup lookup failed, skipping alert");
                result.cache_skipped += 1;
                result.errors.push(format!("{fingerprint}: {e}"));
                continue;
            }
        };

        if !settings.policy.is_eligible(&alert, cached) {
            tracing::debug!(fingerprint, "Already notified");
            result.already_notified += 1;
            continue;
        }

        if !pause.is_zero() {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    result.interrupted = true;
                    break;
                }
                () = tokio::time::sleep(pause) => {}
            }
        }

        let sent = collaborators.channel.send(&render(&alert)).await;
        pause = pause_after(&sent, settings.notify_delay);

        if let Err(e) = sent {
            tracing::warn!(
                fingerprint,
                channel = collaborators.channel.name(),
                error = %e,
                "Failed to send notification"
            );
            result.notify_failed += 1;
            result.errors.push(format!("{fingerprint}: notify failed: {e}"));
            continue;
        }

        tracing::info!(
            fingerprint,
            alert_name = %alert.alert_name,
            severity = %alert.severity,
            "Alert dispatched"
        );

        if let Err(e) = collaborators
            .cache
            .put(fingerprint, &alert.snapshot(), settings.dedup_ttl)
            .await
        {
            tracing::error!(
                fingerprint,
                error = %e,
                "Alert dispatched but dedup entry not written, it may be announced again"
            );
            result
                .errors
                .push(format!("{fingerprint}: cache write failed: {e}"));
        }

        result.dispatched.push(alert.fingerprint);
    }

    result.finish()
}

/// Delay owed after a send attempt. A rate-limited attempt waits at least as
/// long as the provider asked.
fn pause_after(sent: &Result<(), ChannelError>, notify_delay: Duration) -> Duration {
    match sent {
        Err(ChannelError::RateLimited { retry_after_secs }) => {
            notify_delay.max(Duration::from_secs(*retry_after_secs))
        }
        _ => notify_delay,
    }
}

async fn poll_loop(
    collaborators: Collaborators,
    settings: PollerSettings,
    cancel: CancellationToken,
    last_cycle: Arc<RwLock<Option<PollCycleResult>>>,
) {
    tracing::info!(
        interval_secs = settings.interval.as_secs(),
        dedup_ttl_secs = settings.dedup_ttl.as_secs(),
        "Poll loop started"
    );

    loop {
        let result = run_cycle(&collaborators, &settings, &cancel).await;

        if result.source_error.is_none() {
            tracing::info!(
                fetched = result.fetched,
                dispatched = result.dispatched.len(),
                already_notified = result.already_notified,
                filtered = result.filtered,
                malformed = result.malformed,
                cache_skipped = result.cache_skipped,
                notify_failed = result.notify_failed,
                "Poll cycle complete"
            );
        }

        let interrupted = result.interrupted;
        *last_cycle.write().await = Some(result);
        if interrupted {
            break;
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(settings.interval) => {}
        }
    }

    tracing::info!("Poll loop stopped");
}

/// Lifecycle of the background loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopStatus {
    NotStarted,
    Running,
    /// Cancellation requested; the task has not exited yet.
    Stopping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopping,
    NotRunning,
}

struct LoopTask {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl LoopTask {
    fn status(&self) -> LoopStatus {
        if self.task.is_finished() {
            LoopStatus::NotStarted
        } else if self.cancel.is_cancelled() {
            LoopStatus::Stopping
        } else {
            LoopStatus::Running
        }
    }
}

struct PollerInner {
    collaborators: Collaborators,
    settings: PollerSettings,
    task: Mutex<Option<LoopTask>>,
    last_cycle: Arc<RwLock<Option<PollCycleResult>>>,
}

/// Cloneable handle that starts, stops and inspects the poll loop.
#[derive(Clone)]
pub struct PollerHandle {
    inner: Arc<PollerInner>,
}

impl PollerHandle {
    #[must_use]
    pub fn new(collaborators: Collaborators, settings: PollerSettings) -> Self {
        Self {
            inner: Arc::new(PollerInner {
                collaborators,
                settings,
                task: Mutex::new(None),
                last_cycle: Arc::new(RwLock::new(None)),
            }),
        }
    }

    /// Spawn the loop unless one is already running or still stopping.
    pub async fn start(&self) -> StartOutcome {
        let mut slot = self.inner.task.lock().await;

        if let Some(existing) = slot.as_ref() {
            if existing.status() != LoopStatus::NotStarted {
                return StartOutcome::AlreadyRunning;
            }
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(poll_loop(
            self.inner.collaborators.clone(),
            self.inner.settings.clone(),
            cancel.clone(),
            Arc::clone(&self.inner.last_cycle),
        ));

        *slot = Some(LoopTask { cancel, task });
        StartOutcome::Started
    }

    /// Request cancellation and return without waiting.
    pub async fn stop(&self) -> StopOutcome {
        let slot = self.inner.task.lock().await;

        match slot.as_ref() {
            Some(running) if running.status() != LoopStatus::NotStarted => {
                running.cancel.cancel();
                StopOutcome::Stopping
            }
            _ => StopOutcome::NotRunning,
        }
    }

    /// Cancel the loop and wait for the task to exit.
    pub async fn shutdown(&self) {
        let mut slot = self.inner.task.lock().await;

        if let Some(running) = slot.take() {
            running.cancel.cancel();
            if let Err(e) = running.task.await {
                tracing::error!(error = %e, "Poll loop task failed");
            }
        }
    }

    pub async fn status(&self) -> LoopStatus {
        self.inner
            .task
            .lock()
            .await
            .as_ref()
            .map_or(LoopStatus::NotStarted, LoopTask::status)
    }

    /// Summary of the most recent completed cycle.
    pub async fn last_cycle(&self) -> Option<PollCycleResult> {
        self.inner.last_cycle.read().await.clone()
    }

    #[must_use]
    pub fn settings(&self) -> &PollerSettings {
        &self.inner.settings
    }
}
