//! Alert model and normalization.
//!
//! Alertmanager returns each alert as a loosely structured JSON document. The
//! relay only needs a handful of fields, so every raw record is flattened into
//! a [`NormalizedAlert`] through the fixed [`FIELD_PATHS`] table. Missing
//! optional fields fall back to empty values; a missing fingerprint is the
//! only hard failure because it is the dedup key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MalformedAlert;

/// Alert record exactly as returned by the source.
pub type RawAlert = Value;

/// JSON paths of the fields the relay reads from a raw alert.
#[derive(Debug, Clone, Copy)]
pub struct FieldPaths {
    pub fingerprint: &'static [&'static str],
    pub alert_name: &'static [&'static str],
    pub severity: &'static [&'static str],
    pub started_at: &'static [&'static str],
    pub receivers: &'static [&'static str],
    pub description: &'static [&'static str],
    pub runbook_url: &'static [&'static str],
}

/// Field layout of Alertmanager's `/api/v1/alerts` records.
pub const FIELD_PATHS: FieldPaths = FieldPaths {
    fingerprint: &["fingerprint"],
    alert_name: &["labels", "alertname"],
    severity: &["labels", "severity"],
    started_at: &["startsAt"],
    receivers: &["receivers"],
    description: &["annotations", "description"],
    runbook_url: &["annotations", "runbook_url"],
};

/// Canonical view of one firing alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedAlert {
    /// Stable identity assigned by the source; never empty.
    pub fingerprint: String,
    pub alert_name: String,
    pub severity: String,
    /// `None` when the source omitted `startsAt` or sent an unparseable value.
    pub started_at: Option<DateTime<Utc>>,
    /// Receiver names in source order.
    pub receivers: Vec<String>,
    pub description: String,
    pub runbook_url: Option<String>,
}

impl NormalizedAlert {
    /// Flatten a raw alert record.
    pub fn from_raw(raw: &RawAlert) -> Result<Self, MalformedAlert> {
        if !raw.is_object() {
            return Err(MalformedAlert::NotAnObject);
        }

        let fingerprint = string_at(raw, FIELD_PATHS.fingerprint)
            .map(str::trim)
            .filter(|fp| !fp.is_empty())
            .ok_or(MalformedAlert::MissingFingerprint)?
            .to_string();

        let started_at = string_at(raw, FIELD_PATHS.started_at).and_then(|ts| {
            DateTime::parse_from_rfc3339(ts)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        });

        Ok(Self {
            fingerprint,
            alert_name: owned_or_empty(raw, FIELD_PATHS.alert_name),
            severity: owned_or_empty(raw, FIELD_PATHS.severity),
            started_at,
            receivers: receivers_at(raw, FIELD_PATHS.receivers),
            description: owned_or_empty(raw, FIELD_PATHS.description),
            runbook_url: string_at(raw, FIELD_PATHS.runbook_url)
                .filter(|url| !url.is_empty())
                .map(str::to_string),
        })
    }

    /// The audited subset written to the dedup cache.
    #[must_use]
    pub fn snapshot(&self) -> AlertSnapshot {
        AlertSnapshot {
            alert_name: self.alert_name.clone(),
            severity: self.severity.clone(),
            started_at: self.started_at,
            receivers: self.receivers.clone(),
            description: self.description.clone(),
            runbook_url: self.runbook_url.clone(),
        }
    }
}

/// Normalize a raw alert record.
pub fn normalize(raw: &RawAlert) -> Result<NormalizedAlert, MalformedAlert> {
    NormalizedAlert::from_raw(raw)
}

/// Value stored in the dedup cache for a notified alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertSnapshot {
    pub alert_name: String,
    pub severity: String,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub receivers: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runbook_url: Option<String>,
}

fn value_at<'a>(raw: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(raw, |node, key| node.get(key))
}

fn string_at<'a>(raw: &'a Value, path: &[&str]) -> Option<&'a str> {
    value_at(raw, path).and_then(Value::as_str)
}

fn owned_or_empty(raw: &Value, path: &[&str]) -> String {
    string_at(raw, path).unwrap_or_default().to_string()
}

/// Receivers are plain strings in the v1 API and `{ "name": ... }` objects in v2.
fn receivers_at(raw: &Value, path: &[&str]) -> Vec<String> {
    value_at(raw, path)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(name) => Some(name.clone()),
                    Value::Object(obj) => obj.get("name").and_then(Value::as_str).map(str::to_string),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}
