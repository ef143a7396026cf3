use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::recording::{ActionKind, RecordingId};

/// What happened to one action record during replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    /// Target resolved (or navigation performed) and the action ran
    Acted,
    /// Target resolved but there was nothing to enter
    Found,
    /// No action needed: already on the URL, or an informational record
    Skipped { reason: String },
    NotFound,
    Error { message: String },
}

impl StepOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, StepOutcome::NotFound | StepOutcome::Error { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    /// Zero-based position in the recording
    pub index: usize,
    pub kind: ActionKind,
    #[serde(flatten)]
    pub outcome: StepOutcome,
    /// Resolver strategy that located the target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
}

/// Outcome of a whole replay.
///
/// `completed` means the session ran to the end without a session-level failure
/// or cancellation. It says nothing about individual steps; use
/// [`ReplayResult::all_succeeded`] for strict success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_id: Option<RecordingId>,
    pub platform: String,
    pub completed: bool,
    pub cancelled: bool,
    pub steps: Vec<StepReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ReplayResult {
    pub fn all_succeeded(&self) -> bool {
        self.completed && !self.steps.iter().any(|step| step.outcome.is_failure())
    }

    pub fn failed_steps(&self) -> Vec<&StepReport> {
        self.steps
            .iter()
            .filter(|step| step.outcome.is_failure())
            .collect()
    }
}
