use serde::Serialize;
use std::fmt;

use crate::error::HatchError;

/// Pipeline steps in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepId {
    Init,
    Normalize,
    ConfigureIdentity,
    RecordProvenance,
    Lock,
    StageAll,
    ConfigureRemote,
    Commit,
    Push,
    ForceReconcileRelease,
    CutRelease,
    BestEffortInit,
    NotifyOptionalIntegration,
}

impl StepId {
    pub const ALL: [StepId; 13] = [
        StepId::Init,
        StepId::Normalize,
        StepId::ConfigureIdentity,
        StepId::RecordProvenance,
        StepId::Lock,
        StepId::StageAll,
        StepId::ConfigureRemote,
        StepId::Commit,
        StepId::Push,
        StepId::ForceReconcileRelease,
        StepId::CutRelease,
        StepId::BestEffortInit,
        StepId::NotifyOptionalIntegration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepId::Init => "init",
            StepId::Normalize => "normalize",
            StepId::ConfigureIdentity => "configure-identity",
            StepId::RecordProvenance => "record-provenance",
            StepId::Lock => "lock",
            StepId::StageAll => "stage-all",
            StepId::ConfigureRemote => "configure-remote",
            StepId::Commit => "commit",
            StepId::Push => "push",
            StepId::ForceReconcileRelease => "force-reconcile-release",
            StepId::CutRelease => "cut-release",
            StepId::BestEffortInit => "best-effort-init",
            StepId::NotifyOptionalIntegration => "notify-optional-integration",
        }
    }

    pub fn policy(&self) -> Policy {
        match self {
            StepId::ForceReconcileRelease
            | StepId::BestEffortInit
            | StepId::NotifyOptionalIntegration => Policy::BestEffort,
            _ => Policy::MustSucceed,
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Policy {
    MustSucceed,
    BestEffort,
}

impl Policy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Policy::MustSucceed => "must-succeed",
            Policy::BestEffort => "best-effort",
        }
    }
}

/// Whether a step's guard lets it run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum Decision {
    Run,
    Skip(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedStep {
    pub step: StepId,
    pub policy: Policy,
    #[serde(flatten)]
    pub decision: Decision,
}

/// Result of executing one step, before the driver applies it.
#[derive(Debug)]
pub enum StepOutcome {
    Ok,
    Skipped { reason: &'static str },
    SoftFailure { detail: String },
    HardFailure(HatchError),
}

/// What the driver recorded for a step that did not abort the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepStatus {
    Done,
    Skipped { reason: &'static str },
    SoftFailed { detail: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub step: StepId,
    #[serde(flatten)]
    pub status: StepStatus,
}
