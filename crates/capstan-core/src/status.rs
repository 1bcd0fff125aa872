use serde::{Deserialize, Serialize};
use std::fmt;

/// Deployment lifecycle status
///
/// `Queued` is the initial state. `Running` and `Failed` are terminal:
/// nothing transitions out of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    #[default]
    Queued,
    Running,
    Failed,
}

impl DeploymentStatus {
    /// Whether the state machine allows moving from `self` to `to`
    pub fn can_transition_to(&self, to: DeploymentStatus) -> bool {
        matches!(
            (self, to),
            (DeploymentStatus::Queued, DeploymentStatus::Running)
                | (DeploymentStatus::Queued, DeploymentStatus::Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeploymentStatus::Queued)
    }

    /// Parse from the lowercase status string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(DeploymentStatus::Queued),
            "running" => Some(DeploymentStatus::Running),
            "failed" => Some(DeploymentStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeploymentStatus::Queued => "queued",
            DeploymentStatus::Running => "running",
            DeploymentStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queued_transitions() {
        let s = DeploymentStatus::Queued;
        assert!(s.can_transition_to(DeploymentStatus::Running));
        assert!(s.can_transition_to(DeploymentStatus::Failed));
        assert!(!s.can_transition_to(DeploymentStatus::Queued));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for from in [DeploymentStatus::Running, DeploymentStatus::Failed] {
            assert!(from.is_terminal());
            for to in [
                DeploymentStatus::Queued,
                DeploymentStatus::Running,
                DeploymentStatus::Failed,
            ] {
                assert!(!from.can_transition_to(to), "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn test_parse_roundtrips_display() {
        for s in [
            DeploymentStatus::Queued,
            DeploymentStatus::Running,
            DeploymentStatus::Failed,
        ] {
            assert_eq!(DeploymentStatus::parse(&s.to_string()), Some(s));
        }
        assert_eq!(DeploymentStatus::parse("pending"), None);
    }

    #[test]
    fn test_serde_uses_lowercase() {
        let json = serde_json::to_string(&DeploymentStatus::Running).unwrap();
        assert_eq!(json, "\"running\"");
    }
}
