//! Chat notification channels for the alert relay.
//!
//! A channel delivers one pre-rendered text message to one fixed chat
//! destination. Delivery errors are returned to the caller, which decides
//! whether they matter; the relay logs them and moves on to the next alert.
//!
//! # Usage
//!
//! ```no_run
//! use notify::{NotifyChannel, TelegramChannel};
//!
//! # async fn run() -> Result<(), notify::ChannelError> {
//! let channel = TelegramChannel::new("123456:bot-token", "-100200300");
//! channel.send("[FIRING] HighLatency").await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`NotifyChannel`] trait defines the interface for notification channels
//! - [`TelegramChannel`] implements delivery through the Telegram Bot API

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod channels;
pub mod error;

pub use channels::telegram::TelegramChannel;
pub use channels::NotifyChannel;
pub use error::ChannelError;
