//! Run reports.

use crate::state::RunState;
use crate::wake::WakeOutcome;
use inksync_core::{ErrorKind, SyncAction, SyncMode};
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Why an action was not attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// The user declined the plan.
    NotConfirmed,
    /// The run was cancelled before the action was issued.
    Cancelled,
    /// The gallery it depends on could not be created.
    DependencyFailed {
        /// Gallery whose creation failed.
        gallery: String,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotConfirmed => write!(f, "not confirmed"),
            SkipReason::Cancelled => write!(f, "cancelled"),
            SkipReason::DependencyFailed { gallery } => {
                write!(f, "gallery {} could not be created", gallery)
            }
        }
    }
}

/// Outcome of one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// The device accepted the action.
    Applied,
    /// The action was not attempted.
    Skipped {
        /// Why.
        reason: SkipReason,
    },
    /// The device or the local side failed the action.
    Failed {
        /// Error message.
        reason: String,
    },
}

impl ActionOutcome {
    /// Returns true for `Applied`.
    pub fn is_applied(&self) -> bool {
        matches!(self, ActionOutcome::Applied)
    }

    /// Returns true for `Failed`.
    pub fn is_failed(&self) -> bool {
        matches!(self, ActionOutcome::Failed { .. })
    }

    /// Returns true for `Skipped`.
    pub fn is_skipped(&self) -> bool {
        matches!(self, ActionOutcome::Skipped { .. })
    }
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionOutcome::Applied => write!(f, "ok"),
            ActionOutcome::Skipped { reason } => write!(f, "skipped ({})", reason),
            ActionOutcome::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis().min(u128::from(u64::MAX)) as u64)
}

/// Report of one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionReport {
    /// The planned action.
    pub action: SyncAction,
    /// What happened.
    pub outcome: ActionOutcome,
    /// Bytes sent to the device.
    pub bytes: u64,
    /// Wall time spent on the action.
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
}

impl ActionReport {
    /// Creates a report for an action that was not attempted.
    pub fn skipped(action: SyncAction, reason: SkipReason) -> Self {
        Self {
            action,
            outcome: ActionOutcome::Skipped { reason },
            bytes: 0,
            duration: Duration::ZERO,
        }
    }
}

/// Aggregate counts of a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportCounts {
    /// Actions applied.
    pub applied: usize,
    /// Actions skipped.
    pub skipped: usize,
    /// Actions failed.
    pub failed: usize,
    /// Images uploaded.
    pub uploaded: usize,
    /// Images and galleries deleted.
    pub deleted: usize,
    /// Galleries created.
    pub created: usize,
}

/// Result of one orchestrated run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    /// Mode of the run.
    pub mode: SyncMode,
    /// Final state.
    pub state: RunState,
    /// Outcome of the wake handshake, if one was attempted.
    pub wake: Option<WakeOutcome>,
    /// Number of local assets scanned.
    pub local_assets: usize,
    /// Number of local assets already in sync.
    pub unchanged: usize,
    /// Whether the plan was confirmed, if confirmation was needed.
    pub confirmed: Option<bool>,
    /// Per action outcomes, in plan order.
    pub actions: Vec<ActionReport>,
    /// Fatal error that ended the run early.
    pub error: Option<String>,
    /// Kind of that error.
    pub error_kind: Option<ErrorKind>,
    /// Whether the device was put to sleep afterwards.
    pub slept: bool,
    /// Total wall time.
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
}

impl SyncReport {
    /// Creates an empty report.
    pub fn new(mode: SyncMode) -> Self {
        Self {
            mode,
            state: RunState::Start,
            wake: None,
            local_assets: 0,
            unchanged: 0,
            confirmed: None,
            actions: Vec::new(),
            error: None,
            error_kind: None,
            slept: false,
            duration: Duration::ZERO,
        }
    }

    /// Returns aggregate counts.
    pub fn counts(&self) -> ReportCounts {
        let mut counts = ReportCounts::default();
        for report in &self.actions {
            match &report.outcome {
                ActionOutcome::Applied => {
                    counts.applied += 1;
                    match &report.action {
                        SyncAction::CreateGallery { .. } => counts.created += 1,
                        SyncAction::UploadAsset { .. } => counts.uploaded += 1,
                        SyncAction::DeleteAsset { .. } | SyncAction::DeleteGallery { .. } => {
                            counts.deleted += 1
                        }
                    }
                }
                ActionOutcome::Skipped { .. } => counts.skipped += 1,
                ActionOutcome::Failed { .. } => counts.failed += 1,
            }
        }
        counts
    }

    /// Iterates over failed actions.
    pub fn failures(&self) -> impl Iterator<Item = &ActionReport> {
        self.actions.iter().filter(|r| r.outcome.is_failed())
    }

    /// Returns the bytes uploaded by applied actions.
    pub fn bytes_transferred(&self) -> u64 {
        self.actions
            .iter()
            .filter(|r| r.outcome.is_applied())
            .map(|r| r.bytes)
            .sum()
    }

    /// Returns the average upload throughput in bytes per second.
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.bytes_transferred() as f64 / secs
        } else {
            0.0
        }
    }

    /// Returns true if the user declined the plan.
    pub fn declined(&self) -> bool {
        self.confirmed == Some(false)
    }

    /// Returns true if the run completed and nothing failed.
    ///
    /// A declined plan counts as success: nothing was meant to happen.
    /// Actions skipped for any other reason do not.
    pub fn is_success(&self) -> bool {
        self.state == RunState::Done
            && self.error.is_none()
            && self.actions.iter().all(|r| match &r.outcome {
                ActionOutcome::Applied => true,
                ActionOutcome::Skipped { reason } => *reason == SkipReason::NotConfirmed,
                ActionOutcome::Failed { .. } => false,
            })
    }
}
