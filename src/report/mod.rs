// ABOUTME: Control-plane reporting client: status push and command polling.
// ABOUTME: Defines the wire messages and the trait concrete transports implement.

mod error;
mod http;
mod listener;
mod memory;
mod reporter;

pub use error::{ReportError, ReportErrorKind};
pub use http::HttpControlPlane;
pub use listener::CommandListener;
pub use memory::MemoryControlPlane;
pub use reporter::Reporter;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::StageKind;
use crate::deploy::{
    Deployment, DeploymentStatus, ExternalCommand, FailureCause, StageError, StageInstance,
    StageStatus,
};
use crate::types::DeploymentId;

/// The subset of the control-plane API the engine calls.
///
/// Receivers must tolerate duplicate status updates.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn report_deployment_status(&self, update: &StatusUpdate) -> Result<(), ReportError>;

    /// Commands queued for the deployment; an empty list is normal.
    async fn poll_commands(
        &self,
        deployment_id: &DeploymentId,
    ) -> Result<Vec<ExternalCommand>, ReportError>;
}

/// Full status of a deployment at one transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub deployment_id: DeploymentId,
    pub status: DeploymentStatus,
    pub rolled_back: bool,
    pub stages: Vec<StageStatusEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureCause>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_failure: Option<FailureCause>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageStatusEntry {
    pub index: u32,
    pub kind: StageKind,
    pub status: StageStatus,
    pub attempt: u32,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StageError>,
}

/// Identity of one observed stage transition.
pub type StatusKey = (DeploymentId, u32, StageStatus, u32);

impl StatusUpdate {
    pub fn from_deployment(deployment: &Deployment) -> Self {
        Self {
            deployment_id: deployment.id().clone(),
            status: deployment.status(),
            rolled_back: deployment.rolled_back(),
            stages: deployment.stages().iter().map(StageStatusEntry::from).collect(),
            failure: deployment.failure().cloned(),
            rollback_failure: deployment.rollback_failure().cloned(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = StatusKey> + '_ {
        self.stages
            .iter()
            .map(|s| (self.deployment_id.clone(), s.index, s.status, s.attempt))
    }
}

impl From<&StageInstance> for StageStatusEntry {
    fn from(stage: &StageInstance) -> Self {
        Self {
            index: stage.index(),
            kind: stage.kind(),
            status: stage.status(),
            attempt: stage.attempt(),
            started_at: stage.started_at(),
            finished_at: stage.finished_at(),
            error: stage.error().cloned(),
        }
    }
}
