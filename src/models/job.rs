use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Processing status of an image annotation job.
///
/// The state machine is `pending -> processing -> completed | failed`. The
/// submission handler moves a record to `processing`; only the background
/// annotation task writes a terminal state. A process crash mid-flight leaves
/// the record in `processing` — resubmission is the remediation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    /// Whether the job has reached a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_round_trip() {
        assert_eq!(ProcessingStatus::Processing.to_string(), "processing");
        assert_eq!(
            ProcessingStatus::from_str("completed").unwrap(),
            ProcessingStatus::Completed
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(ProcessingStatus::Completed.is_terminal());
        assert!(ProcessingStatus::Failed.is_terminal());
        assert!(!ProcessingStatus::Pending.is_terminal());
        assert!(!ProcessingStatus::Processing.is_terminal());
    }
}
