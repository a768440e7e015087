//! Alert relay - forwards newly firing Alertmanager alerts to a chat.
//!
//! Every poll cycle fetches the firing alerts, drops the ones the
//! receiver/severity allow-lists reject, skips the ones already announced
//! within the dedup window, and sends one chat message per remaining alert.
//! A dispatched alert is written to the dedup cache so later cycles stay
//! quiet until the entry expires.
//!
//! # Architecture
//!
//! - [`source`] - Alertmanager client behind the [`AlertSource`] trait
//! - [`alert`] - raw record normalization
//! - [`cache`] - [`DedupCache`] trait with Redis and in-memory stores
//! - [`policy`] - receiver and severity allow-lists
//! - [`message`] - chat message template
//! - [`poller`] - the poll loop and its start/stop handle
//! - [`server`] - HTTP control surface
//! - [`config`] - CLI flags and environment

pub mod alert;
pub mod cache;
pub mod config;
pub mod error;
pub mod message;
pub mod policy;
pub mod poller;
pub mod server;
pub mod source;

pub use alert::{normalize, AlertSnapshot, NormalizedAlert, RawAlert};
pub use cache::{DedupCache, MemoryCache, RedisCache};
pub use config::{RelayArgs, RelayConfig};
pub use error::{CacheError, ConfigError, MalformedAlert, NotifyError, SourceError};
pub use policy::EligibilityPolicy;
pub use poller::{
    run_cycle, Collaborators, LoopStatus, PollCycleResult, PollerHandle, PollerSettings,
    StartOutcome, StopOutcome,
};
pub use server::{build_router, AppState};
pub use source::{AlertSource, AlertmanagerClient};
