use super::{MigrationStep, StepOutcome};
use crate::errors::{ErrorKind, StrataError, StrataResult};
use crate::ledger::LedgerEntry;
use crate::version::Version;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// A step as seen in plans and reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRef {
    pub version: Version,
    pub name: String,
}

impl From<&MigrationStep> for StepRef {
    fn from(step: &MigrationStep) -> Self {
        StepRef {
            version: step.version(),
            name: step.name().to_string(),
        }
    }
}

impl Display for StepRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.version, self.name)
    }
}

/// A step committed during a run: its transform succeeded and the ledger was updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub step: StepRef,
    pub outcome: StepOutcome,
}

/// The step that halted a run.
#[derive(Debug, Clone)]
pub struct StepFailure {
    pub step: StepRef,
    pub error: StrataError,
}

/// Result of an upgrade or downgrade run.
///
/// A run stops at the first failing step. Steps committed before it stay
/// committed and are listed in `committed`; the failure is in `failure`.
#[derive(Debug, Clone)]
pub struct MigrationReport {
    pub direction: Direction,
    pub dry_run: bool,
    /// The steps the run set out to execute, in execution order.
    pub planned: Vec<StepRef>,
    pub committed: Vec<StepRecord>,
    pub failure: Option<StepFailure>,
}

impl MigrationReport {
    pub(crate) fn new(direction: Direction, dry_run: bool, planned: Vec<StepRef>) -> Self {
        MigrationReport {
            direction,
            dry_run,
            planned,
            committed: Vec::new(),
            failure: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn committed_versions(&self) -> Vec<Version> {
        self.committed.iter().map(|record| record.step.version).collect()
    }

    /// Converts a failed run into a [`ErrorKind::StepFailed`] error whose cause
    /// is the step's own error.
    pub fn into_result(self) -> StrataResult<MigrationReport> {
        match &self.failure {
            None => Ok(self),
            Some(failure) => {
                let committed = if self.committed.is_empty() {
                    "none".to_string()
                } else {
                    self.committed.iter().map(|record| record.step.version).join(", ")
                };
                Err(StrataError::new_with_cause(
                    &format!(
                        "Migration {} failed ({}); committed in this run: {}",
                        failure.step, self.direction, committed
                    ),
                    ErrorKind::StepFailed,
                    failure.error.clone(),
                ))
            }
        }
    }
}

/// Status of one catalog step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepStatus {
    pub step: StepRef,
    pub applied_at: Option<DateTime<Utc>>,
    pub reversible: bool,
}

impl StepStatus {
    pub fn is_applied(&self) -> bool {
        self.applied_at.is_some()
    }
}

/// The ledger compared against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Highest applied version.
    pub current: Version,
    /// Every catalog step, ascending.
    pub steps: Vec<StepStatus>,
    /// Ledger entries whose version the catalog does not contain.
    pub unknown: Vec<LedgerEntry>,
}

impl MigrationStatus {
    pub fn pending(&self) -> impl Iterator<Item = &StepStatus> {
        self.steps.iter().filter(|status| !status.is_applied())
    }

    pub fn applied(&self) -> impl Iterator<Item = &StepStatus> {
        self.steps.iter().filter(|status| status.is_applied())
    }
}
