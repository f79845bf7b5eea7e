// ABOUTME: In-process control plane keeping the latest observed deployment state.
// ABOUTME: Backs local runs without a remote control plane and the engine's tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};

use super::{ControlPlane, ReportError, StatusKey, StatusUpdate};
use crate::deploy::ExternalCommand;
use crate::types::DeploymentId;

#[derive(Debug, Default)]
struct State {
    latest: HashMap<DeploymentId, StatusUpdate>,
    seen: HashSet<StatusKey>,
    transitions: Vec<StatusKey>,
    commands: HashMap<DeploymentId, VecDeque<ExternalCommand>>,
    failing_reports: u32,
    report_calls: usize,
}

/// Idempotent receiver: replaying an update leaves the observed state as is.
#[derive(Debug, Default)]
pub struct MemoryControlPlane {
    state: Mutex<State>,
}

impl MemoryControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a command for the next poll.
    pub fn push_command(&self, deployment_id: &DeploymentId, command: ExternalCommand) {
        self.state
            .lock()
            .commands
            .entry(deployment_id.clone())
            .or_default()
            .push_back(command);
    }

    /// Make the next `n` status reports fail with a retryable error.
    pub fn fail_next_reports(&self, n: u32) {
        self.state.lock().failing_reports = n;
    }

    /// Latest status accepted for the deployment.
    pub fn observed(&self, deployment_id: &DeploymentId) -> Option<StatusUpdate> {
        self.state.lock().latest.get(deployment_id).cloned()
    }

    /// Distinct `(deployment, stage, status, attempt)` transitions, in arrival order.
    pub fn transitions(&self, deployment_id: &DeploymentId) -> Vec<StatusKey> {
        self.state
            .lock()
            .transitions
            .iter()
            .filter(|key| &key.0 == deployment_id)
            .cloned()
            .collect()
    }

    /// Number of report calls received, including failed ones.
    pub fn report_calls(&self) -> usize {
        self.state.lock().report_calls
    }
}

#[async_trait]
impl ControlPlane for MemoryControlPlane {
    async fn report_deployment_status(&self, update: &StatusUpdate) -> Result<(), ReportError> {
        let mut state = self.state.lock();
        state.report_calls += 1;

        if state.failing_reports > 0 {
            state.failing_reports -= 1;
            return Err(ReportError::Unavailable {
                message: "injected failure".to_string(),
            });
        }

        for key in update.keys() {
            if state.seen.insert(key.clone()) {
                state.transitions.push(key);
            }
        }
        state
            .latest
            .insert(update.deployment_id.clone(), update.clone());
        Ok(())
    }

    async fn poll_commands(
        &self,
        deployment_id: &DeploymentId,
    ) -> Result<Vec<ExternalCommand>, ReportError> {
        let mut state = self.state.lock();
        Ok(state
            .commands
            .get_mut(deployment_id)
            .map(|queue| queue.drain(..).collect())
            .unwrap_or_default())
    }
}
