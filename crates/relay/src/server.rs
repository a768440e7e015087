//! HTTP control surface for the relay.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

use crate::cache::DedupCache;
use crate::error::CacheError;
use crate::poller::{LoopStatus, PollCycleResult, PollerHandle, StartOutcome, StopOutcome};

/// Request timeout applied to every route.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Server state shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub poller: PollerHandle,
    pub cache: Arc<dyn DedupCache>,
}

/// Build the control router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/start", get(start_handler).post(start_handler))
        .route("/stop", post(stop_handler))
        .route("/", get(index_handler))
        .route("/healthz", get(liveness_handler))
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/alerts/{fingerprint}", get(alert_lookup_handler))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT)),
        )
        .with_state(state)
}

async fn start_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.poller.start().await {
        StartOutcome::Started => {
            info!("Poll loop start requested");
            (StatusCode::ACCEPTED, Json(json!({ "status": "started" })))
        }
        StartOutcome::AlreadyRunning => {
            (StatusCode::OK, Json(json!({ "status": "already_running" })))
        }
    }
}

async fn stop_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.poller.stop().await {
        StopOutcome::Stopping => {
            info!("Poll loop stop requested");
            (StatusCode::ACCEPTED, Json(json!({ "status": "stopping" })))
        }
        StopOutcome::NotRunning => (StatusCode::OK, Json(json!({ "status": "not_running" }))),
    }
}

async fn index_handler() -> Html<&'static str> {
    Html("<h1>Alert relay</h1>\n<p>Forwards firing Alertmanager alerts to Telegram.</p>")
}

/// Liveness: the process answers. Dependencies are reported by `/health`.
async fn liveness_handler() -> &'static str {
    "OK"
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    cache_reachable: bool,
    loop_status: LoopStatus,
    version: &'static str,
}

/// Health only reflects the dedup cache; source outages are routine.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let cache_reachable = state.cache.ping().await;
    let (code, status) = if cache_reachable {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        code,
        Json(HealthResponse {
            status,
            cache_reachable,
            loop_status: state.poller.status().await,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    loop_status: LoopStatus,
    interval_secs: u64,
    dedup_ttl_secs: u64,
    last_cycle: Option<PollCycleResult>,
}

async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let settings = state.poller.settings();

    Json(StatusResponse {
        loop_status: state.poller.status().await,
        interval_secs: settings.interval.as_secs(),
        dedup_ttl_secs: settings.dedup_ttl.as_secs(),
        last_cycle: state.poller.last_cycle().await,
    })
}

async fn alert_lookup_handler(
    State(state): State<AppState>,
    Path(fingerprint): Path<String>,
) -> Response {
    match state.cache.get(&fingerprint).await {
        Ok(Some(snapshot)) => (StatusCode::OK, Json(snapshot)).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))).into_response(),
        Err(CacheError::Snapshot(e)) => {
            warn!(fingerprint = %fingerprint, error = %e, "Cached entry is not a relay snapshot");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "cached entry has an unrecognized format" })),
            )
                .into_response()
        }
        Err(e) => {
            warn!(fingerprint = %fingerprint, error = %e, "Dedup lookup failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "dedup cache unavailable" })),
            )
                .into_response()
        }
    }
}
