// ABOUTME: Run command implementation.
// ABOUTME: Builds one deployment from a manifest and drives it through the pipeline controller.

use chrono::Utc;
use stagehand::config::{Config, DeploymentSpec};
use stagehand::deploy::{
    ControllerConfig, Deployment, DeploymentStatus, PipelineController, StageStatus,
};
use stagehand::error::{Error, Result};
use stagehand::executor::{
    CancelHandle, DeploymentContext, LocalToolRegistry, PlatformExecutor, ToolRegistry,
};
use stagehand::output::Output;
use stagehand::plan::build_plan;
use stagehand::report::{ControlPlane, HttpControlPlane, MemoryControlPlane};
use stagehand::revision::RevisionId;
use stagehand::types::{ArtifactReference, DeploymentId, RunningState, TriggerContext};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

/// Arguments of `stagehand run`.
#[derive(Debug)]
pub struct RunArgs {
    pub manifest: PathBuf,
    pub commit: String,
    pub id: Option<String>,
    pub changed: Vec<PathBuf>,
    pub running_commit: Option<String>,
    pub running_image: Option<String>,
    pub running_source: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

impl RunArgs {
    fn trigger(&self) -> TriggerContext {
        let trigger =
            TriggerContext::new(self.commit.clone()).with_changed_paths(self.changed.clone());

        if self.running_commit.is_none()
            && self.running_image.is_none()
            && self.running_source.is_none()
        {
            return trigger;
        }

        trigger.with_running(RunningState {
            commit: self.running_commit.clone().unwrap_or_default(),
            artifact: self.running_image.clone().map(ArtifactReference::image),
            source_dir: self.running_source.clone(),
        })
    }
}

/// Deploy one manifest, returning an error unless it ends SUCCESS.
pub async fn run_deployment(args: RunArgs, mut output: Output) -> Result<()> {
    let config = match args.config {
        Some(ref path) => Config::load(path)?,
        None => Config::discover_or_default(&env::current_dir()?)?,
    };

    let spec = DeploymentSpec::load(&args.manifest)?;
    let trigger = args.trigger();
    if !trigger.triggers(&spec.app_dir, &spec.dependencies) {
        output.success(&format!(
            "{}: no relevant changes, nothing to deploy",
            spec.application
        ));
        return Ok(());
    }

    let revision = RevisionId::resolve(&spec, &trigger.commit)?;
    let plan = build_plan(&spec)?;
    let platform = plan.platform;
    let id = DeploymentId::new(
        args.id
            .clone()
            .unwrap_or_else(|| format!("{}-{}", revision, Utc::now().format("%Y%m%d%H%M%S"))),
    );

    output.start_timer();
    output.progress(&format!(
        "Deploying {} revision {} to {} ({} stage(s))",
        spec.application,
        revision,
        platform,
        plan.stages.len()
    ));

    let deployment = Deployment::new(
        id.clone(),
        spec.application.clone(),
        revision.clone(),
        plan,
        spec.auto_rollback,
    );
    let context = DeploymentContext::new(id, &spec, revision, trigger);

    let tools: Arc<dyn ToolRegistry> = Arc::new(LocalToolRegistry::new(config.tools.dir.clone()));
    let executor = Arc::new(PlatformExecutor::for_platform(platform, tools));

    let control_plane: Arc<dyn ControlPlane> = match config.control_plane {
        Some(ref cp) => {
            let client = HttpControlPlane::from_config(cp, &config.agent_id)?;
            output.progress(&format!("  → Reporting to {}", client.address()));
            Arc::new(client)
        }
        None => {
            tracing::debug!("no control plane configured; keeping status in memory");
            Arc::new(MemoryControlPlane::new())
        }
    };

    let controller_config = ControllerConfig::from_config(&config, executor.platform());
    let controller = PipelineController::new(
        deployment,
        context,
        executor,
        control_plane,
        controller_config,
    );

    let watcher = tokio::spawn(print_stages(controller.subscribe(), output.clone()));

    let shutdown = CancelHandle::new();
    let shutdown_signal = shutdown.signal();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping");
            shutdown.cancel();
        }
    });

    let result = controller.run(shutdown_signal).await;
    ctrl_c.abort();
    if let Err(e) = watcher.await {
        tracing::debug!("stage watcher stopped: {}", e);
    }

    let outcome = result?;
    for warning in outcome.diagnostics.warnings() {
        output.warning(&warning.message);
    }

    let deployment = outcome.deployment;
    output.failure_detail(&deployment);

    match deployment.status() {
        DeploymentStatus::Success if deployment.rolled_back() => Err(Error::RolledBack {
            deployment: deployment.id().to_string(),
        }),
        DeploymentStatus::Success => {
            output.success(&format!("Deployed {}", deployment.revision()));
            Ok(())
        }
        status => Err(Error::DeploymentFailed {
            deployment: deployment.id().to_string(),
            status,
        }),
    }
}

/// Print each stage transition as snapshots arrive; ends when the controller is dropped.
async fn print_stages(mut snapshots: watch::Receiver<Deployment>, output: Output) {
    let mut seen: Vec<(u32, String, u32)> = Vec::new();

    loop {
        {
            let deployment = snapshots.borrow_and_update();
            for stage in deployment.stages() {
                if stage.status() == StageStatus::Pending {
                    continue;
                }
                let key = (stage.index(), stage.status().to_string(), stage.attempt());
                if !seen.contains(&key) {
                    output.stage(stage);
                    seen.push(key);
                }
            }
        }
        if snapshots.changed().await.is_err() {
            break;
        }
    }
}
