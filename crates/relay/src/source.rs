//! Alertmanager client for fetching the currently firing alerts.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::alert::RawAlert;
use crate::error::SourceError;

/// Default request timeout for the alert source.
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(30);

/// Anything that can hand the poll loop the current alert set.
#[async_trait]
pub trait AlertSource: Send + Sync {
    /// Fetch every currently firing alert. No internal retry.
    async fn fetch(&self) -> Result<Vec<RawAlert>, SourceError>;
}

#[derive(Debug, Deserialize)]
struct AlertsEnvelope {
    data: Vec<RawAlert>,
}

/// HTTP client for Alertmanager's `/api/v1/alerts` endpoint.
#[derive(Debug, Clone)]
pub struct AlertmanagerClient {
    base_url: String,
    client: reqwest::Client,
}

impl AlertmanagerClient {
    /// Create a client with its own connection pool and request timeout.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(base_url, client))
    }

    #[must_use]
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    #[must_use]
    pub fn alerts_url(&self) -> String {
        format!("{}/api/v1/alerts", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl AlertSource for AlertmanagerClient {
    async fn fetch(&self) -> Result<Vec<RawAlert>, SourceError> {
        let url = self.alerts_url();
        debug!(url = %url, "Fetching alerts");

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status { status, body });
        }

        let body = response.text().await?;
        parse_alerts(&body)
    }
}

fn parse_alerts(body: &str) -> Result<Vec<RawAlert>, SourceError> {
    serde_json::from_str::<AlertsEnvelope>(body)
        .map(|envelope| envelope.data)
        .map_err(|e| SourceError::Payload(e.to_string()))
}
