use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Terminal outcome of a test, and the unit every counter aggregates.
///
/// Variants are declared least-severe first so that the derived `Ord`
/// ranks `Failed` above everything else; rollups pick the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Status {
    Passed,
    Skipped,
    FailedKnownBug,
    Failed,
}

impl Status {
    /// All recognized states, most severe first.
    pub const SEVERITY: [Status; 4] = [
        Status::Failed,
        Status::FailedKnownBug,
        Status::Skipped,
        Status::Passed,
    ];

    /// Whether this state represents failing behavior.
    pub fn is_failure(self) -> bool {
        matches!(self, Status::Failed | Status::FailedKnownBug)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "PASSED"),
            Self::Skipped => write!(f, "SKIPPED"),
            Self::FailedKnownBug => write!(f, "FAILED_KNOWN_BUG"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PASSED" => Ok(Self::Passed),
            "SKIPPED" => Ok(Self::Skipped),
            "FAILED_KNOWN_BUG" => Ok(Self::FailedKnownBug),
            "FAILED" => Ok(Self::Failed),
            other => Err(format!("unrecognized state \"{other}\"")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ranks_failed_worst() {
        assert!(Status::Failed > Status::FailedKnownBug);
        assert!(Status::FailedKnownBug > Status::Skipped);
        assert!(Status::Skipped > Status::Passed);
    }

    #[test]
    fn severity_list_is_worst_first() {
        let mut sorted = Status::SEVERITY;
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(sorted, Status::SEVERITY);
    }

    #[test]
    fn display_wire_names() {
        assert_eq!(Status::Passed.to_string(), "PASSED");
        assert_eq!(Status::Skipped.to_string(), "SKIPPED");
        assert_eq!(Status::FailedKnownBug.to_string(), "FAILED_KNOWN_BUG");
        assert_eq!(Status::Failed.to_string(), "FAILED");
    }

    #[test]
    fn from_str_round_trips() {
        for state in Status::SEVERITY {
            assert_eq!(state.to_string().parse::<Status>().unwrap(), state);
        }
    }

    #[test]
    fn from_str_rejects_unknown() {
        let err = "BROKEN".parse::<Status>().unwrap_err();
        assert!(err.contains("BROKEN"));
    }

    #[test]
    fn failure_states() {
        assert!(Status::Failed.is_failure());
        assert!(Status::FailedKnownBug.is_failure());
        assert!(!Status::Skipped.is_failure());
        assert!(!Status::Passed.is_failure());
    }
}
