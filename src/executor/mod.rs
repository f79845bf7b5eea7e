// ABOUTME: Platform executor plugins and the contract they implement.
// ABOUTME: PlatformExecutor selects the concrete plugin from the plan's platform.

mod cancel;
mod error;
mod kubernetes;
mod lambda;
pub mod process;
mod terraform;
mod tools;
mod traits;
mod wait;

pub use cancel::{CancelHandle, CancelSignal};
pub use error::{ExecutorError, FailureKind};
pub use kubernetes::KubernetesExecutor;
pub use lambda::LambdaExecutor;
pub use terraform::TerraformExecutor;
pub use tools::{LocalToolRegistry, ToolError, ToolRegistry};
pub use traits::{DeploymentContext, StageContext, StageExecutor, StageResult};

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Platform;
use crate::deploy::StageInstance;

/// Tagged union over the supported platform plugins.
pub enum PlatformExecutor {
    Kubernetes(KubernetesExecutor),
    Lambda(LambdaExecutor),
    Terraform(TerraformExecutor),
}

impl PlatformExecutor {
    pub fn for_platform(platform: Platform, tools: Arc<dyn ToolRegistry>) -> Self {
        match platform {
            Platform::Kubernetes => PlatformExecutor::Kubernetes(KubernetesExecutor::new(tools)),
            Platform::Lambda => PlatformExecutor::Lambda(LambdaExecutor::new(tools)),
            Platform::Terraform => PlatformExecutor::Terraform(TerraformExecutor::new(tools)),
        }
    }

    pub fn platform(&self) -> Platform {
        match self {
            PlatformExecutor::Kubernetes(_) => Platform::Kubernetes,
            PlatformExecutor::Lambda(_) => Platform::Lambda,
            PlatformExecutor::Terraform(_) => Platform::Terraform,
        }
    }
}

#[async_trait]
impl StageExecutor for PlatformExecutor {
    async fn execute(
        &self,
        ctx: &StageContext,
        stage: &StageInstance,
        deployment: &DeploymentContext,
    ) -> Result<StageResult, ExecutorError> {
        match self {
            PlatformExecutor::Kubernetes(e) => e.execute(ctx, stage, deployment).await,
            PlatformExecutor::Lambda(e) => e.execute(ctx, stage, deployment).await,
            PlatformExecutor::Terraform(e) => e.execute(ctx, stage, deployment).await,
        }
    }

    async fn rollback(
        &self,
        ctx: &StageContext,
        stage: &StageInstance,
        deployment: &DeploymentContext,
    ) -> Result<(), ExecutorError> {
        match self {
            PlatformExecutor::Kubernetes(e) => e.rollback(ctx, stage, deployment).await,
            PlatformExecutor::Lambda(e) => e.rollback(ctx, stage, deployment).await,
            PlatformExecutor::Terraform(e) => e.rollback(ctx, stage, deployment).await,
        }
    }
}

/// Environment passed to every platform tool invocation.
pub fn deployment_env(deployment: &DeploymentContext) -> HashMap<String, String> {
    let mut env = HashMap::new();
    env.insert(
        "STAGEHAND_DEPLOYMENT_ID".to_string(),
        deployment.id.to_string(),
    );
    env.insert(
        "STAGEHAND_APPLICATION".to_string(),
        deployment.application.to_string(),
    );
    env.insert(
        "STAGEHAND_REVISION".to_string(),
        deployment.revision.to_string(),
    );
    env.insert(
        "STAGEHAND_COMMIT".to_string(),
        deployment.trigger.commit.clone(),
    );
    env
}

async fn resolve_tool(
    tools: &dyn ToolRegistry,
    deployment: &DeploymentContext,
) -> Result<PathBuf, ExecutorError> {
    tools
        .resolve_executable(
            deployment.target.platform(),
            deployment.target.tool_version(),
        )
        .await
        .map_err(|e| ExecutorError::configuration(e.to_string()))
}

fn unsupported(stage: &StageInstance, deployment: &DeploymentContext) -> ExecutorError {
    ExecutorError::configuration(format!(
        "{} stages are not supported on {}",
        stage.kind(),
        deployment.target.platform()
    ))
}
