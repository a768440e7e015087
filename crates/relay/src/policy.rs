//! Eligibility policy: which alerts get announced.

use std::collections::BTreeSet;

use crate::alert::NormalizedAlert;

/// Receivers announced when no allow-list is configured.
pub const DEFAULT_RECEIVERS: &[&str] = &["default"];

/// Severities announced when no allow-list is configured.
pub const DEFAULT_SEVERITIES: &[&str] = &["disaster", "critical", "warning"];

/// Static receiver and severity allow-lists.
///
/// Both checks are exact, case-sensitive set membership. The policy holds no
/// state, so the same alert always gets the same answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityPolicy {
    receivers: BTreeSet<String>,
    severities: BTreeSet<String>,
}

impl EligibilityPolicy {
    pub fn new<R, S>(receivers: R, severities: S) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<String>,
    {
        Self {
            receivers: receivers.into_iter().map(Into::into).collect(),
            severities: severities.into_iter().map(Into::into).collect(),
        }
    }

    pub fn receivers(&self) -> impl Iterator<Item = &str> {
        self.receivers.iter().map(String::as_str)
    }

    pub fn severities(&self) -> impl Iterator<Item = &str> {
        self.severities.iter().map(String::as_str)
    }

    /// The cache-independent half of the decision.
    #[must_use]
    pub fn allows(&self, alert: &NormalizedAlert) -> bool {
        self.severities.contains(&alert.severity)
            && alert.receivers.iter().any(|r| self.receivers.contains(r))
    }

    /// Full decision: allowed by policy and not announced yet.
    #[must_use]
    pub fn is_eligible(&self, alert: &NormalizedAlert, cache_has_entry: bool) -> bool {
        !cache_has_entry && self.allows(alert)
    }
}

impl Default for EligibilityPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_RECEIVERS.iter().copied(),
            DEFAULT_SEVERITIES.iter().copied(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(severity: &str, receivers: &[&str]) -> NormalizedAlert {
        NormalizedAlert {
            fingerprint: "f1".to_string(),
            alert_name: "HighLatency".to_string(),
            severity: severity.to_string(),
            started_at: None,
            receivers: receivers.iter().map(ToString::to_string).collect(),
            description: String::new(),
            runbook_url: None,
        }
    }

    #[test]
    fn test_default_lists() {
        let policy = EligibilityPolicy::default();
        assert_eq!(policy.receivers().collect::<Vec<_>>(), vec!["default"]);
        assert_eq!(
            policy.severities().collect::<Vec<_>>(),
            vec!["critical", "disaster", "warning"]
        );
    }

    #[test]
    fn test_eligible_when_new_and_allowed() {
        let policy = EligibilityPolicy::default();
        assert!(policy.is_eligible(&alert("critical", &["default"]), false));
        assert!(policy.is_eligible(&alert("disaster", &["default"]), false));
        assert!(policy.is_eligible(&alert("warning", &["default"]), false));
    }

    #[test]
    fn test_cached_alert_is_not_eligible() {
        let policy = EligibilityPolicy::default();
        assert!(!policy.is_eligible(&alert("critical", &["default"]), true));
    }

    #[test]
    fn test_severity_outside_allow_list() {
        let policy = EligibilityPolicy::default();
        for cached in [false, true] {
            assert!(!policy.is_eligible(&alert("info", &["default"]), cached));
            assert!(!policy.is_eligible(&alert("Critical", &["default"]), cached));
            assert!(!policy.is_eligible(&alert("", &["default"]), cached));
        }
    }

    #[test]
    fn test_receiver_membership_is_not_positional() {
        let policy = EligibilityPolicy::default();
        assert!(policy.allows(&alert("critical", &["oncall", "default"])));
        assert!(!policy.allows(&alert("critical", &["oncall"])));
        assert!(!policy.allows(&alert("critical", &[])));
    }

    #[test]
    fn test_custom_lists() {
        let policy = EligibilityPolicy::new(["team-a", "team-b"], ["page"]);
        assert!(policy.allows(&alert("page", &["team-b"])));
        assert!(!policy.allows(&alert("critical", &["team-a"])));
        assert!(!policy.allows(&alert("page", &["default"])));
    }
}
