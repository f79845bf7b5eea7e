// ABOUTME: Serverless function executor driving the aws CLI.
// ABOUTME: Updates function code from an image or storage object; rollback restores it.

use async_trait::async_trait;
use std::sync::Arc;

use super::error::ExecutorError;
use super::process::{self, ToolCommand};
use super::tools::ToolRegistry;
use super::traits::{DeploymentContext, StageContext, StageExecutor, StageResult};
use super::{deployment_env, resolve_tool, unsupported, wait};
use crate::config::{LambdaInput, StageKind, Target};
use crate::deploy::StageInstance;
use crate::types::ArtifactReference;

pub struct LambdaExecutor {
    tools: Arc<dyn ToolRegistry>,
}

impl LambdaExecutor {
    pub fn new(tools: Arc<dyn ToolRegistry>) -> Self {
        Self { tools }
    }

    fn input(deployment: &DeploymentContext) -> Result<&LambdaInput, ExecutorError> {
        match &deployment.target {
            Target::Lambda(input) => Ok(input),
            other => Err(ExecutorError::configuration(format!(
                "lambda executor given a {} target",
                other.platform()
            ))),
        }
    }

    async fn update_code(
        &self,
        ctx: &StageContext,
        deployment: &DeploymentContext,
        artifact: &ArtifactReference,
    ) -> Result<(), ExecutorError> {
        let input = Self::input(deployment)?;
        let aws = resolve_tool(self.tools.as_ref(), deployment).await?;
        let function = input
            .function_name
            .clone()
            .unwrap_or_else(|| deployment.application.to_string());

        let mut command = ToolCommand::new(aws)
            .args(["lambda", "update-function-code", "--function-name"])
            .arg(function)
            .arg("--publish");
        if let Some(ref region) = input.region {
            command = command.arg("--region").arg(region.as_str());
        }
        command = match artifact {
            ArtifactReference::Image(uri) => command.arg("--image-uri").arg(uri.as_str()),
            ArtifactReference::Storage(object) => {
                let mut command = command
                    .arg("--s3-bucket")
                    .arg(object.bucket.as_str())
                    .arg("--s3-key")
                    .arg(object.key.as_str());
                if !object.version.is_empty() {
                    command = command
                        .arg("--s3-object-version")
                        .arg(object.version.as_str());
                }
                command
            }
        };

        process::run(&command.envs(deployment_env(deployment)), &ctx.cancel).await?;
        Ok(())
    }

    async fn restore(
        &self,
        ctx: &StageContext,
        deployment: &DeploymentContext,
    ) -> Result<(), ExecutorError> {
        let running = deployment
            .trigger
            .running
            .as_ref()
            .and_then(|r| r.artifact.as_ref())
            .ok_or_else(|| {
                ExecutorError::rejected("no running artifact recorded to roll back to")
            })?;
        self.update_code(ctx, deployment, running).await
    }
}

#[async_trait]
impl StageExecutor for LambdaExecutor {
    async fn execute(
        &self,
        ctx: &StageContext,
        stage: &StageInstance,
        deployment: &DeploymentContext,
    ) -> Result<StageResult, ExecutorError> {
        match stage.kind() {
            StageKind::Sync | StageKind::Apply => {
                self.update_code(ctx, deployment, &deployment.artifact).await?;
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
