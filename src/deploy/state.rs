// ABOUTME: Status enums for stages and whole deployments.
// ABOUTME: Terminal statuses never change once reached.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one stage instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageStatus {
    Pending,
    Running,
    Success,
    /// Terminal unless the failure is transient and retries remain.
    Failure,
    Skipped,
    Cancelled,
}

impl StageStatus {
    /// Completed in a way that lets the next stage start.
    pub fn is_done(self) -> bool {
        matches!(self, StageStatus::Success | StageStatus::Skipped)
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StageStatus::Pending => "PENDING",
            StageStatus::Running => "RUNNING",
            StageStatus::Success => "SUCCESS",
            StageStatus::Failure => "FAILURE",
            StageStatus::Skipped => "SKIPPED",
            StageStatus::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// Lifecycle of a deployment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentStatus {
    Pending,
    Running,
    RollingBack,
    Success,
    Failure,
    Cancelled,
}

impl DeploymentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DeploymentStatus::Success | DeploymentStatus::Failure | DeploymentStatus::Cancelled
        )
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeploymentStatus::Pending => "PENDING",
            DeploymentStatus::Running => "RUNNING",
            DeploymentStatus::RollingBack => "ROLLING_BACK",
            DeploymentStatus::Success => "SUCCESS",
            DeploymentStatus::Failure => "FAILURE",
            DeploymentStatus::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}
