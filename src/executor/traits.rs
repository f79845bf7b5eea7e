// ABOUTME: Capability trait every platform executor implements.
// ABOUTME: Also defines the per-stage and per-deployment context handed to executors.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use super::cancel::CancelSignal;
use super::error::ExecutorError;
use crate::config::{DeploymentSpec, Target};
use crate::deploy::StageInstance;
use crate::revision::RevisionId;
use crate::types::{ApplicationName, ArtifactReference, DeploymentId, TriggerContext};

/// Outcome of a stage attempt that ran to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageResult {
    Success,
    /// The executor ran but the platform reported the change failed.
    Failure,
    /// Nothing to do for this stage.
    Skipped,
}

/// Per-attempt context.
#[derive(Debug, Clone)]
pub struct StageContext {
    /// Raised on CANCEL, SKIP of the running stage, or shutdown.
    pub cancel: CancelSignal,
    /// How long the controller waits after raising `cancel`.
    pub grace_period: Duration,
}

impl StageContext {
    pub fn new(cancel: CancelSignal, grace_period: Duration) -> Self {
        Self {
            cancel,
            grace_period,
        }
    }
}

/// Immutable facts about the deployment an executor acts on.
#[derive(Debug, Clone)]
pub struct DeploymentContext {
    pub id: DeploymentId,
    pub application: ApplicationName,
    pub revision: RevisionId,
    pub artifact: ArtifactReference,
    pub target: Target,
    pub trigger: TriggerContext,
    /// Directory platform paths are resolved against.
    pub app_dir: PathBuf,
}

impl DeploymentContext {
    pub fn new(
        id: DeploymentId,
        spec: &DeploymentSpec,
        revision: RevisionId,
        trigger: TriggerContext,
    ) -> Self {
        Self {
            id,
            application: spec.application.clone(),
            revision,
            artifact: spec.artifact.clone(),
            target: spec.target.clone(),
            trigger,
            app_dir: spec.app_dir.clone(),
        }
    }
}

/// One implementation per platform.
///
/// Repeating `execute` for a fresh attempt after a failure must be safe on
/// the target platform. Implementations must return promptly once
/// `ctx.cancel` fires.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    async fn execute(
        &self,
        ctx: &StageContext,
        stage: &StageInstance,
        deployment: &DeploymentContext,
    ) -> Result<StageResult, ExecutorError>;

    /// Platform inverse of a stage that previously succeeded.
    async fn rollback(
        &self,
        ctx: &StageContext,
        stage: &StageInstance,
        deployment: &DeploymentContext,
    ) -> Result<(), ExecutorError>;
}
