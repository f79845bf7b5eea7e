// ABOUTME: Integration tests for the stage plan builder.
// ABOUTME: Validates quick sync, pipeline ordering, and plan configuration errors.

use stagehand::config::{DeploymentSpec, Platform, StageKind};
use stagehand::deploy::{StageInstance, StageStatus};
use stagehand::plan::{DeployStrategy, PlanError, build_plan};

fn spec(yaml: &str) -> DeploymentSpec {
    DeploymentSpec::from_yaml(yaml).unwrap()
}

#[test]
fn pipeline_keeps_declared_order() {
    let spec = spec(
        r#"
application: infra
artifact:
  image: repo/infra:1
target:
  platform: terraform
  workspace: prod
pipeline:
  stages:
    - kind: PLAN
    - kind: WAIT
      with:
        duration: 30s
    - kind: APPLY
      with:
        requiresApproval: true
"#,
    );

    let plan = build_plan(&spec).unwrap();
    assert_eq!(plan.platform, Platform::Terraform);
    assert_eq!(plan.strategy, DeployStrategy::Pipeline);

    let kinds: Vec<StageKind> = plan.stages.iter().map(StageInstance::kind).collect();
    assert_eq!(kinds, [StageKind::Plan, StageKind::Wait, StageKind::Apply]);

    let indices: Vec<u32> = plan.stages.iter().map(StageInstance::index).collect();
    assert_eq!(indices, [0, 1, 2]);

    assert!(plan.stages.iter().all(|s| s.status() == StageStatus::Pending));
    assert!(plan.stages.iter().all(|s| s.attempt() == 0));
    assert!(plan.stages.last().requires_approval());
}

#[test]
fn quick_sync_carries_its_options() {
    let spec = spec(
        r#"
application: web
artifact:
  image: repo/web:1.0
target:
  platform: kubernetes
quickSync:
  retries: 3
"#,
    );

    let plan = build_plan(&spec).unwrap();
    assert_eq!(plan.strategy, DeployStrategy::QuickSync);
    assert_eq!(plan.stages.len(), 1);
    assert_eq!(plan.stages.head.kind(), StageKind::Sync);
    assert_eq!(plan.stages.head.max_retries(), 3);
}

#[test]
fn explicit_empty_pipeline_is_rejected() {
    let spec = spec(
        r#"
application: web
artifact:
  image: repo/web:1.0
target:
  platform: kubernetes
pipeline:
  stages: []
"#,
    );

    assert_eq!(build_plan(&spec).unwrap_err(), PlanError::EmptyPipeline);
}

#[test]
fn plan_stage_outside_terraform_is_rejected() {
    let spec = spec(
        r#"
application: my-fn
artifact:
  image: repo/my-fn:1.0
target:
  platform: lambda
pipeline:
  stages:
    - kind: SYNC
    - kind: PLAN
"#,
    );

    assert_eq!(
        build_plan(&spec).unwrap_err(),
        PlanError::UnsupportedStage {
            index: 1,
            kind: StageKind::Plan,
            platform: Platform::Lambda,
        }
    );
}

#[test]
fn building_twice_yields_equal_plans() {
    let spec = spec(
        r#"
application: web
artifact:
  image: repo/web:1.0
target:
  platform: kubernetes
retryPolicy:
  maxRetries: 1
pipeline:
  stages:
    - kind: SYNC
    - kind: WAIT
"#,
    );

    let a = build_plan(&spec).unwrap();
    let b = build_plan(&spec).unwrap();
    let describe = |plan: &stagehand::plan::Plan| -> Vec<(u32, StageKind, u32)> {
        plan.stages
            .iter()
            .map(|s| (s.index(), s.kind(), s.max_retries()))
            .collect()
    };
    assert_eq!(describe(&a), describe(&b));
}
