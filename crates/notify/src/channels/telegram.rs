//! Telegram Bot API notification channel.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ChannelError;
use crate::NotifyChannel;

/// Public Telegram Bot API endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Longest `sendMessage` text the Bot API accepts, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Retry hint used when a 429 response carries no `retry_after`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Sends messages to a single Telegram chat through a bot.
pub struct TelegramChannel {
    api_base: String,
    token: String,
    chat_id: String,
    client: reqwest::Client,
}

impl TelegramChannel {
    /// Create a channel for the given bot token and destination chat.
    #[must_use]
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token: token.into(),
            chat_id: chat_id.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the channel at a different Bot API host (self-hosted API server, tests).
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Use a preconfigured HTTP client (timeouts, proxies).
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Destination chat identity.
    #[must_use]
    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    fn send_message_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.api_base.trim_end_matches('/'),
            self.token
        )
    }
}

#[async_trait]
impl NotifyChannel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, message: &str) -> Result<(), ChannelError> {
        if self.token.is_empty() {
            return Err(ChannelError::NotConfigured("TELEGRAM_TOKEN".to_string()));
        }
        if self.chat_id.is_empty() {
            return Err(ChannelError::NotConfigured("CHAT_ID".to_string()));
        }

        let payload = SendMessage {
            chat_id: &self.chat_id,
            text: message,
            disable_web_page_preview: true,
        };

        debug!(channel = "telegram", chat_id = %self.chat_id, "Sending notification");

        // The bot token is part of the URL, keep it out of error messages.
        let response = self
            .client
            .post(self.send_message_url())
            .json(&payload)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        let status = response.status();
        let body: ApiResponse = response.json().await.unwrap_or_default();

        if status.is_success() && body.ok {
            debug!(channel = "telegram", "Notification sent successfully");
            return Ok(());
        }

        if status.as_u16() == 429 || body.error_code == Some(429) {
            let retry_after = body
                .parameters
                .and_then(|p| p.retry_after)
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);

            warn!(
                channel = "telegram",
                retry_after_secs = retry_after,
                "Rate limited by Telegram"
            );

            return Err(ChannelError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        let description = body
            .description
            .unwrap_or_else(|| "no description".to_string());

        warn!(
            channel = "telegram",
            status = %status,
            description = %description,
            "Telegram sendMessage failed"
        );

        Err(ChannelError::Api {
            status: status.as_u16(),
            description,
        })
    }
}

// =============================================================================
// Telegram Bot API types
// =============================================================================

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}
