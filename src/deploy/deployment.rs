// ABOUTME: Deployment run aggregate owning the ordered stage instances.
// ABOUTME: Tracks overall status, rollback bookkeeping, and the original failure cause.

use chrono::{DateTime, Utc};
use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};

use super::stage::StageInstance;
use super::state::{DeploymentStatus, StageStatus};
use crate::config::Platform;
use crate::executor::FailureKind;
use crate::plan::Plan;
use crate::revision::RevisionId;
use crate::types::{ApplicationName, DeploymentId};

/// What went wrong, and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureCause {
    pub stage_index: u32,
    pub kind: FailureKind,
    pub message: String,
}

/// One run of one deployment. Never restarted once terminal.
#[derive(Debug, Clone)]
pub struct Deployment {
    id: DeploymentId,
    application: ApplicationName,
    revision: RevisionId,
    platform: Platform,
    auto_rollback: bool,
    stages: NonEmpty<StageInstance>,
    status: DeploymentStatus,
    rolled_back: bool,
    failure: Option<FailureCause>,
    rollback_failure: Option<FailureCause>,
    created_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

/// Status implied by stage statuses alone.
///
/// Work remaining keeps the run RUNNING; all stages SUCCESS or SKIPPED is
/// SUCCESS; anything else is FAILURE. CANCELLED is never derived.
pub fn derive_status<'a>(stages: impl IntoIterator<Item = &'a StageInstance>) -> DeploymentStatus {
    let mut all_done = true;
    for stage in stages {
        match stage.status() {
            StageStatus::Pending | StageStatus::Running => return DeploymentStatus::Running,
            status if status.is_done() => {}
            _ => all_done = false,
        }
    }
    if all_done {
        DeploymentStatus::Success
    } else {
        DeploymentStatus::Failure
    }
}

impl Deployment {
    pub fn new(
        id: DeploymentId,
        application: ApplicationName,
        revision: RevisionId,
        plan: Plan,
        auto_rollback: bool,
    ) -> Self {
        Self {
            id,
            application,
            revision,
            platform: plan.platform,
            auto_rollback,
            stages: plan.stages,
            status: DeploymentStatus::Pending,
            rolled_back: false,
            failure: None,
            rollback_failure: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn id(&self) -> &DeploymentId {
        &self.id
    }

    pub fn application(&self) -> &ApplicationName {
        &self.application
    }

    pub fn revision(&self) -> &RevisionId {
        &self.revision
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn auto_rollback(&self) -> bool {
        self.auto_rollback
    }

    pub fn status(&self) -> DeploymentStatus {
        self.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn rolled_back(&self) -> bool {
        self.rolled_back
    }

    /// The failure that ended forward progress; kept through rollback.
    pub fn failure(&self) -> Option<&FailureCause> {
        self.failure.as_ref()
    }

    pub fn rollback_failure(&self) -> Option<&FailureCause> {
        self.rollback_failure.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn stages(&self) -> &NonEmpty<StageInstance> {
        &self.stages
    }

    pub fn stage(&self, index: u32) -> Option<&StageInstance> {
        self.stages.get(index as usize)
    }

    pub(crate) fn stage_mut(&mut self, index: u32) -> Option<&mut StageInstance> {
        self.stages.get_mut(index as usize)
    }

    /// Lowest-index stage that has not started.
    pub fn next_pending(&self) -> Option<u32> {
        self.stages
            .iter()
            .find(|s| s.status() == StageStatus::Pending)
            .map(StageInstance::index)
    }

    /// Stage currently RUNNING, if any.
    pub fn running_stage(&self) -> Option<u32> {
        self.stages
            .iter()
            .find(|s| s.status() == StageStatus::Running)
            .map(StageInstance::index)
    }

    /// PENDING → RUNNING
    pub fn start(&mut self) -> Result<(), DeploymentTransitionError> {
        self.expect(DeploymentStatus::Pending, DeploymentStatus::Running)?;
        self.status = DeploymentStatus::Running;
        Ok(())
    }

    /// Settle a RUNNING deployment whose stages are all done.
    ///
    /// Returns the new status; stays RUNNING while work remains.
    pub fn complete(&mut self) -> DeploymentStatus {
        if self.status == DeploymentStatus::Running
            && derive_status(self.stages.iter()) == DeploymentStatus::Success
        {
            self.terminate(DeploymentStatus::Success);
        }
        self.status
    }

    /// Record a stage's terminal failure.
    ///
    /// With auto-rollback the deployment enters ROLLING_BACK; otherwise it
    /// fails immediately.
    pub fn record_failure(
        &mut self,
        cause: FailureCause,
    ) -> Result<DeploymentStatus, DeploymentTransitionError> {
        let next = if self.auto_rollback {
            DeploymentStatus::RollingBack
        } else {
            DeploymentStatus::Failure
        };
        self.expect(DeploymentStatus::Running, next)?;
        self.failure = Some(cause);
        if next == DeploymentStatus::RollingBack {
            self.status = next;
        } else {
            self.terminate(next);
        }
        Ok(next)
    }

    /// Stages to undo, in reverse index order.
    pub fn rollback_targets(&self) -> Vec<u32> {
        let mut targets: Vec<u32> = self
            .stages
            .iter()
            .filter(|s| s.status() == StageStatus::Success)
            .map(StageInstance::index)
            .collect();
        targets.reverse();
        targets
    }

    /// ROLLING_BACK → SUCCESS when every inverse succeeded, FAILURE otherwise.
    ///
    /// The original failure cause stays in place either way.
    pub fn finish_rollback(
        &mut self,
        result: Result<(), FailureCause>,
    ) -> Result<DeploymentStatus, DeploymentTransitionError> {
        let next = if result.is_ok() {
            DeploymentStatus::Success
        } else {
            DeploymentStatus::Failure
        };
        self.expect(DeploymentStatus::RollingBack, next)?;
        match result {
            Ok(()) => self.rolled_back = true,
            Err(cause) => self.rollback_failure = Some(cause),
        }
        self.terminate(next);
        Ok(next)
    }

    /// Explicit cancellation: RUNNING → CANCELLED.
    ///
    /// The running stage and every pending stage become CANCELLED.
    pub fn cancel(&mut self) -> Result<(), DeploymentTransitionError> {
        self.expect(DeploymentStatus::Running, DeploymentStatus::Cancelled)?;
        for stage in self.stages.iter_mut() {
            if matches!(stage.status(), StageStatus::Pending | StageStatus::Running) {
                // Only PENDING/RUNNING reach here, both of which may cancel.
                let _ = stage.cancel();
            }
        }
        self.terminate(DeploymentStatus::Cancelled);
        Ok(())
    }

    fn terminate(&mut self, status: DeploymentStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }

    fn expect(
        &self,
        from: DeploymentStatus,
        to: DeploymentStatus,
    ) -> Result<(), DeploymentTransitionError> {
        if self.status == from {
            Ok(())
        } else {
            Err(DeploymentTransitionError {
                from: self.status,
                to,
            })
        }
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("deployment cannot transition from {from} to {to}")]
pub struct DeploymentTransitionError {
    pub from: DeploymentStatus,
    pub to: DeploymentStatus,
}
