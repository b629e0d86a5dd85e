//! Automation run status vocabulary and the fixed progress lookup table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a single automation run.
///
/// Transitions are one-directional through the canonical sequence; the only
/// way back to `Idle` is a controller stop. `Cancelled` is reserved for
/// explicit service shutdown and never terminates an idea-processing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomationStatus {
    Idle,
    Initializing,
    ProcessingIdea,
    LaunchingCursor,
    InteractingWithComposer,
    MonitoringProgress,
    Testing,
    Deploying,
    Completed,
    Failed,
    Cancelled,
}

impl AutomationStatus {
    /// Fixed progress percentage for each status.
    ///
    /// Both terminal states map to 100 so a finished run always reports a
    /// complete progress bar, success or not.
    pub fn progress(self) -> u8 {
        match self {
            AutomationStatus::Idle => 0,
            AutomationStatus::Initializing => 5,
            AutomationStatus::ProcessingIdea => 10,
            AutomationStatus::LaunchingCursor => 20,
            AutomationStatus::InteractingWithComposer => 30,
            AutomationStatus::MonitoringProgress => 50,
            AutomationStatus::Testing => 70,
            AutomationStatus::Deploying => 85,
            AutomationStatus::Completed => 100,
            AutomationStatus::Failed => 100,
            AutomationStatus::Cancelled => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AutomationStatus::Idle => "idle",
            AutomationStatus::Initializing => "initializing",
            AutomationStatus::ProcessingIdea => "processing_idea",
            AutomationStatus::LaunchingCursor => "launching_cursor",
            AutomationStatus::InteractingWithComposer => "interacting_with_composer",
            AutomationStatus::MonitoringProgress => "monitoring_progress",
            AutomationStatus::Testing => "testing",
            AutomationStatus::Deploying => "deploying",
            AutomationStatus::Completed => "completed",
            AutomationStatus::Failed => "failed",
            AutomationStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AutomationStatus::Completed | AutomationStatus::Failed
        )
    }
}

impl std::fmt::Display for AutomationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One progress notification, emitted on every status transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub status: AutomationStatus,
    pub message: String,
    /// 0–100, non-decreasing across the canonical sequence.
    pub percentage: u8,
    pub timestamp: DateTime<Utc>,
}

impl ProgressUpdate {
    pub fn now(status: AutomationStatus, message: impl Into<String>, percentage: u8) -> Self {
        Self {
            status,
            message: message.into(),
            percentage,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANONICAL: [AutomationStatus; 9] = [
        AutomationStatus::Idle,
        AutomationStatus::Initializing,
        AutomationStatus::ProcessingIdea,
        AutomationStatus::LaunchingCursor,
        AutomationStatus::InteractingWithComposer,
        AutomationStatus::MonitoringProgress,
        AutomationStatus::Testing,
        AutomationStatus::Deploying,
        AutomationStatus::Completed,
    ];

    #[test]
    fn progress_is_monotonic_over_canonical_sequence() {
        let mut last = 0;
        for status in CANONICAL {
            assert!(
                status.progress() >= last,
                "{status} regressed from {last}"
            );
            last = status.progress();
        }
        assert_eq!(last, 100);
    }

    #[test]
    fn terminal_states_report_full_progress() {
        assert_eq!(AutomationStatus::Completed.progress(), 100);
        assert_eq!(AutomationStatus::Failed.progress(), 100);
        assert!(AutomationStatus::Completed.is_terminal());
        assert!(AutomationStatus::Failed.is_terminal());
        assert!(!AutomationStatus::Cancelled.is_terminal());
    }

    #[test]
    fn serde_tags_are_snake_case() {
        let json = serde_json::to_string(&AutomationStatus::LaunchingCursor).unwrap();
        assert_eq!(json, "\"launching_cursor\"");
        let back: AutomationStatus = serde_json::from_str("\"processing_idea\"").unwrap();
        assert_eq!(back, AutomationStatus::ProcessingIdea);
    }
}
