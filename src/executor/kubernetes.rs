// ABOUTME: Kubernetes executor driving kubectl.
// ABOUTME: Applies manifests for SYNC/APPLY and undoes the rollout on rollback.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use super::error::ExecutorError;
use super::process::{self, ToolCommand};
use super::tools::ToolRegistry;
use super::traits::{DeploymentContext, StageContext, StageExecutor, StageResult};
use super::{deployment_env, resolve_tool, unsupported, wait};
use crate::config::{KubernetesInput, StageKind, Target};
use crate::deploy::StageInstance;

pub struct KubernetesExecutor {
    tools: Arc<dyn ToolRegistry>,
}

impl KubernetesExecutor {
    pub fn new(tools: Arc<dyn ToolRegistry>) -> Self {
        Self { tools }
    }

    fn input(deployment: &DeploymentContext) -> Result<&KubernetesInput, ExecutorError> {
        match &deployment.target {
            Target::Kubernetes(input) => Ok(input),
            other => Err(ExecutorError::configuration(format!(
                "kubernetes executor given a {} target",
                other.platform()
            ))),
        }
    }

    async fn apply(
        &self,
        ctx: &StageContext,
        deployment: &DeploymentContext,
        source: &Path,
    ) -> Result<(), ExecutorError> {
        let input = Self::input(deployment)?;
        let kubectl = resolve_tool(self.tools.as_ref(), deployment).await?;

        let mut command = ToolCommand::new(kubectl)
            .arg("apply")
            .arg("-f")
            .arg(source.join(&input.manifests).display().to_string());
        if let Some(ref namespace) = input.namespace {
            command = command.arg("--namespace").arg(namespace.as_str());
        }

        process::run(&command.envs(deployment_env(deployment)), &ctx.cancel).await?;
        Ok(())
    }

    async fn restore(
        &self,
        ctx: &StageContext,
        deployment: &DeploymentContext,
    ) -> Result<(), ExecutorError> {
        // Prefer re-applying the running manifests; fall back to the
        // controller's own rollout history.
        if let Some(source) = deployment
            .trigger
            .running
            .as_ref()
            .and_then(|r| r.source_dir.as_deref())
        {
            return self.apply(ctx, deployment, source).await;
        }

        let input = Self::input(deployment)?;
        let kubectl = resolve_tool(self.tools.as_ref(), deployment).await?;
        let mut command = ToolCommand::new(kubectl)
            .arg("rollout")
            .arg("undo")
            .arg(format!("deployment/{}", deployment.application));
        if let Some(ref namespace) = input.namespace {
            command = command.arg("--namespace").arg(namespace.as_str());
        }

        process::run(&command.envs(deployment_env(deployment)), &ctx.cancel).await?;
        Ok(())
    }
}

#[async_trait]
impl StageExecutor for KubernetesExecutor {
    async fn execute(
        &self,
        ctx: &StageContext,
        stage: &StageInstance,
        deployment: &DeploymentContext,
    ) -> Result<StageResult, ExecutorError> {
        match stage.kind() {
            StageKind::Sync | StageKind::Apply => {
                self.apply(ctx, deployment, &deployment.app_dir).await?;
                Ok(StageResult::Success)
            }
            StageKind::Wait => wait::wait(ctx, stage).await,
            StageKind::Rollback => {
                self.restore(ctx, deployment).await?;
                Ok(StageResult::Success)
            }
            StageKind::Plan => Err(unsupported(stage, deployment)),
        }
    }

    async fn rollback(
        &self,
        ctx: &StageContext,
        stage: &StageInstance,
        deployment: &DeploymentContext,
    ) -> Result<(), ExecutorError> {
        match stage.kind() {
            StageKind::Sync | StageKind::Apply => self.restore(ctx, deployment).await,
            StageKind::Plan | StageKind::Wait | StageKind::Rollback => Ok(()),
        }
    }
}
