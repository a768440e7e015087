//! Chat message template for a firing alert.

use notify::channels::telegram::MAX_MESSAGE_CHARS;

use crate::alert::NormalizedAlert;

/// Display format for the alert start time (`DD-MM-YYYY HH:MM`, UTC).
pub const START_TIME_FORMAT: &str = "%d-%m-%Y %H:%M";

/// Render the notification text for one alert.
#[must_use]
pub fn render(alert: &NormalizedAlert) -> String {
    let active_from = alert.started_at.map_or_else(
        || "unknown".to_string(),
        |ts| ts.format(START_TIME_FORMAT).to_string(),
    );

    let mut message = format!(
        "[FIRING] {}\n\nACTIVE FROM: {}\n\nSEVERITY: {}\n\nDESCRIPTION: ",
        alert.alert_name,
        active_from,
        alert.severity.to_uppercase(),
    );
    let runbook = alert
        .runbook_url
        .as_ref()
        .map(|url| format!("\n\nRUNBOOK: {url}"))
        .unwrap_or_default();

    let budget =
        MAX_MESSAGE_CHARS.saturating_sub(message.chars().count() + runbook.chars().count());
    push_truncated(&mut message, &alert.description, budget);
    message.push_str(&runbook);

    message
}

/// Append at most `budget` characters of `text`, marking a cut with an ellipsis.
fn push_truncated(out: &mut String, text: &str, budget: usize) {
    if text.chars().count() <= budget {
        out.push_str(text);
    } else if budget > 0 {
        out.extend(text.chars().take(budget - 1));
        out.push('…');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn alert() -> NormalizedAlert {
        NormalizedAlert {
            fingerprint: "f1".to_string(),
            alert_name: "HighLatency".to_string(),
            severity: "critical".to_string(),
            started_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 9, 5, 59).unwrap()),
            receivers: vec!["default".to_string()],
            description: "p99 latency above 2s".to_string(),
            runbook_url: None,
        }
    }

    #[test]
    fn test_render_template() {
        assert_eq!(
            render(&alert()),
            "[FIRING] HighLatency\n\nACTIVE FROM: 01-05-2024 09:05\n\nSEVERITY: CRITICAL\n\nDESCRIPTION: p99 latency above 2s"
        );
    }

    #[test]
    fn test_render_appends_runbook() {
        let mut alert = alert();
        alert.runbook_url = Some("https://runbooks.example.com/latency".to_string());

        assert!(render(&alert).ends_with("\n\nRUNBOOK: https://runbooks.example.com/latency"));
    }

    #[test]
    fn test_render_unknown_start() {
        let mut alert = alert();
        alert.started_at = None;

        assert!(render(&alert).contains("ACTIVE FROM: unknown"));
    }

    #[test]
    fn test_long_description_is_truncated() {
        let mut alert = alert();
        alert.description = "é".repeat(10_000);
        alert.runbook_url = Some("https://runbooks.example.com/latency".to_string());

        let message = render(&alert);

        assert_eq!(message.chars().count(), MAX_MESSAGE_CHARS);
        assert!(message.contains("é…\n\nRUNBOOK: "));
        assert!(message.ends_with("/latency"));
    }
}
