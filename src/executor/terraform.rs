// ABOUTME: Infrastructure-as-code executor driving terraform.
// ABOUTME: Plans and applies the application directory; rollback applies the running source.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::error::ExecutorError;
use super::process::{self, ToolCommand};
use super::tools::ToolRegistry;
use super::traits::{DeploymentContext, StageContext, StageExecutor, StageResult};
use super::{deployment_env, resolve_tool, wait};
use crate::config::{StageKind, Target, TerraformInput};
use crate::deploy::StageInstance;

/// Printed by `terraform plan` when the state already matches.
const NO_CHANGES: &str = "No changes.";

pub struct TerraformExecutor {
    tools: Arc<dyn ToolRegistry>,
}

/// One terraform working directory with the manifest's inputs bound.
struct Workspace<'a> {
    terraform: PathBuf,
    dir: &'a Path,
    input: &'a TerraformInput,
    deployment: &'a DeploymentContext,
}

impl Workspace<'_> {
    fn command(&self, subcommand: &str) -> ToolCommand {
        ToolCommand::new(&self.terraform)
            .arg(subcommand)
            .current_dir(self.dir)
            .envs(deployment_env(self.deployment))
            .envs([("TF_IN_AUTOMATION".to_string(), "1".to_string())].into())
    }

    fn with_vars(&self, mut command: ToolCommand) -> ToolCommand {
        for var in &self.input.vars {
            command = command.arg("-var").arg(var.as_str());
        }
        for file in &self.input.var_files {
            command = command.arg(format!("-var-file={file}"));
        }
        command
    }

    async fn init(&self, ctx: &StageContext) -> Result<(), ExecutorError> {
        process::run(
            &self.command("init").args(["-no-color", "-input=false"]),
            &ctx.cancel,
        )
        .await?;

        if let Some(ref workspace) = self.input.workspace {
            process::run(
                &self
                    .command("workspace")
                    .args(["select", "-or-create", workspace.as_str()]),
                &ctx.cancel,
            )
            .await?;
        }
        Ok(())
    }

    async fn plan(&self, ctx: &StageContext) -> Result<StageResult, ExecutorError> {
        self.init(ctx).await?;
        let output = process::run(
            &self.with_vars(self.command("plan").args(["-no-color", "-input=false"])),
            &ctx.cancel,
        )
        .await?;

        if output.stdout.contains(NO_CHANGES) {
            tracing::info!("terraform plan reported no changes");
            Ok(StageResult::Skipped)
        } else {
            Ok(StageResult::Success)
        }
    }

    async fn apply(&self, ctx: &StageContext) -> Result<(), ExecutorError> {
        self.init(ctx).await?;
        process::run(
            &self.with_vars(
                self.command("apply")
                    .args(["-auto-approve", "-no-color", "-input=false"]),
            ),
            &ctx.cancel,
        )
        .await?;
        Ok(())
    }
}

impl TerraformExecutor {
    pub fn new(tools: Arc<dyn ToolRegistry>) -> Self {
        Self { tools }
    }

    async fn workspace<'a>(
        &self,
        deployment: &'a DeploymentContext,
        dir: &'a Path,
    ) -> Result<Workspace<'a>, ExecutorError> {
        let input = match &deployment.target {
            Target::Terraform(input) => input,
            other => {
                return Err(ExecutorError::configuration(format!(
                    "terraform executor given a {} target",
                    other.platform()
                )));
            }
        };
        let terraform = resolve_tool(self.tools.as_ref(), deployment).await?;
        Ok(Workspace {
            terraform,
            dir,
            input,
            deployment,
        })
    }

    async fn restore(
        &self,
        ctx: &StageContext,
        deployment: &DeploymentContext,
    ) -> Result<(), ExecutorError> {
        let source = deployment
            .trigger
            .running
            .as_ref()
            .and_then(|r| r.source_dir.as_deref())
            .ok_or_else(|| {
                ExecutorError::rejected("no running source recorded to roll back to")
            })?;
        self.workspace(deployment, source).await?.apply(ctx).await
    }
}

#[async_trait]
impl StageExecutor for TerraformExecutor {
    async fn execute(
        &self,
        ctx: &StageContext,
        stage: &StageInstance,
        deployment: &DeploymentContext,
    ) -> Result<StageResult, ExecutorError> {
        match stage.kind() {
            StageKind::Plan => {
                self.workspace(deployment, &deployment.app_dir)
                    .await?
                    .plan(ctx)
                    .await
            }
            StageKind::Sync | StageKind::Apply => {
                self.workspace(deployment, &deployment.app_dir)
                    .await?
                    .apply(ctx)
                    .await?;
                Ok(StageResult::Success)
            }
            StageKind::Wait => wait::wait(ctx, stage).await,
            StageKind::Rollback => {
                self.restore(ctx, deployment).await?;
                Ok(StageResult::Success)
            }
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
