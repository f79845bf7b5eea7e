// ABOUTME: Stage plan builder expanding a deployment spec into stage instances.
// ABOUTME: Pure and deterministic; the platform is fixed here for executor selection.

use nonempty::NonEmpty;
use thiserror::Error;

use crate::config::{DeploymentSpec, Platform, StageKind, StageSpec};
use crate::deploy::StageInstance;

/// How the spec asks to be deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStrategy {
    /// One implicit SYNC stage.
    QuickSync,
    /// The user-defined stage list.
    Pipeline,
}

impl DeployStrategy {
    pub fn for_spec(spec: &DeploymentSpec) -> Self {
        if spec.pipeline.is_some() {
            DeployStrategy::Pipeline
        } else {
            DeployStrategy::QuickSync
        }
    }
}

/// Configuration errors found while building a plan.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("pipeline has no stages")]
    EmptyPipeline,

    #[error("stage {index} ({kind}) is not supported on {platform}")]
    UnsupportedStage {
        index: u32,
        kind: StageKind,
        platform: Platform,
    },
}

/// Ordered, immutable execution plan; every stage starts PENDING.
#[derive(Debug, Clone)]
pub struct Plan {
    pub platform: Platform,
    pub strategy: DeployStrategy,
    pub stages: NonEmpty<StageInstance>,
}

pub fn build_plan(spec: &DeploymentSpec) -> Result<Plan, PlanError> {
    let platform = spec.platform();
    let strategy = DeployStrategy::for_spec(spec);

    let specs: Vec<StageSpec> = match &spec.pipeline {
        None => vec![StageSpec::new(StageKind::Sync, 0).with_options(spec.quick_sync.clone())],
        Some(stages) => stages.clone(),
    };

    let stages = specs
        .into_iter()
        .map(|stage| {
            if !platform.supports(stage.kind) {
                return Err(PlanError::UnsupportedStage {
                    index: stage.index,
                    kind: stage.kind,
                    platform,
                });
            }
            let max_retries = stage
                .options
                .retries()
                .unwrap_or(spec.retry_policy.max_retries);
            Ok(StageInstance::new(stage, max_retries))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let stages = NonEmpty::from_vec(stages).ok_or(PlanError::EmptyPipeline)?;

    tracing::debug!(
        "built {:?} plan with {} stage(s) for {platform}",
        strategy,
        stages.len()
    );

    Ok(Plan {
        platform,
        strategy,
        stages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUICK_SYNC: &str = r#"
application: web
artifact:
  image: repo/web:1.0
target:
  platform: kubernetes
"#;

    #[test]
    fn quick_sync_has_one_sync_stage() {
        let spec = DeploymentSpec::from_yaml(QUICK_SYNC).unwrap();
        assert_eq!(DeployStrategy::for_spec(&spec), DeployStrategy::QuickSync);

        let plan = build_plan(&spec).unwrap();
        assert_eq!(plan.stages.len(), 1);
        assert_eq!(plan.stages.head.kind(), StageKind::Sync);
        assert_eq!(plan.stages.head.index(), 0);
    }

    #[test]
    fn per_stage_retries_override_policy() {
        let yaml = r#"
application: infra
artifact:
  image: repo/infra:1
target:
  platform: terraform
retryPolicy:
  maxRetries: 2
pipeline:
  stages:
    - kind: PLAN
    - kind: APPLY
      with:
        retries: 5
"#;
        let plan = build_plan(&DeploymentSpec::from_yaml(yaml).unwrap()).unwrap();
        let retries: Vec<u32> = plan.stages.iter().map(StageInstance::max_retries).collect();
        assert_eq!(retries, vec![2, 5]);
    }
}
