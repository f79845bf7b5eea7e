// ABOUTME: Integration tests for status reporting and command polling.
// ABOUTME: Uses the in-process control plane to check idempotency and delivery order.

use stagehand::config::{DeploymentSpec, ReportRetryConfig};
use stagehand::deploy::{Deployment, DeploymentStatus, ExternalCommand, StageStatus};
use stagehand::diagnostics::WarningKind;
use stagehand::executor::CancelHandle;
use stagehand::plan::build_plan;
use stagehand::report::{
    CommandListener, ControlPlane, MemoryControlPlane, Reporter, StatusUpdate,
};
use stagehand::revision::RevisionId;
use stagehand::types::DeploymentId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn deployment(id: &str) -> Deployment {
    let spec = DeploymentSpec::from_yaml(
        r#"
application: web
artifact:
  image: repo/web:1.0
target:
  platform: kubernetes
"#,
    )
    .unwrap();
    Deployment::new(
        DeploymentId::new(id),
        spec.application.clone(),
        RevisionId::resolve(&spec, "abc").unwrap(),
        build_plan(&spec).unwrap(),
        false,
    )
}

fn fast_retry(max_attempts: u32) -> ReportRetryConfig {
    ReportRetryConfig {
        max_attempts,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
    }
}

#[tokio::test]
async fn replayed_update_is_idempotent() {
    let control_plane = MemoryControlPlane::new();
    let mut d = deployment("d-1");
    d.start().unwrap();
    let update = StatusUpdate::from_deployment(&d);

    control_plane.report_deployment_status(&update).await.unwrap();
    let first = control_plane.transitions(d.id());
    control_plane.report_deployment_status(&update).await.unwrap();

    assert_eq!(control_plane.transitions(d.id()), first);
    assert_eq!(control_plane.observed(d.id()), Some(update));
    assert_eq!(control_plane.report_calls(), 2);
}

#[tokio::test]
async fn status_update_carries_every_stage() {
    let mut d = deployment("d-2");
    d.start().unwrap();
    let update = StatusUpdate::from_deployment(&d);

    assert_eq!(update.deployment_id.as_str(), "d-2");
    assert_eq!(update.status, DeploymentStatus::Running);
    assert_eq!(update.stages.len(), 1);
    assert_eq!(update.stages[0].status, StageStatus::Pending);

    let json = serde_json::to_value(&update).unwrap();
    assert_eq!(json["deploymentId"], "d-2");
    assert_eq!(json["status"], "RUNNING");
    assert_eq!(json["stages"][0]["kind"], "SYNC");
    assert!(json.get("failure").is_none());
}

#[tokio::test]
async fn reporter_delivers_in_order_after_retries() {
    let control_plane = Arc::new(MemoryControlPlane::new());
    control_plane.fail_next_reports(2);
    let reporter = Reporter::spawn(Arc::clone(&control_plane), fast_retry(5));

    let mut d = deployment("d-3");
    d.start().unwrap();
    reporter.send(StatusUpdate::from_deployment(&d));
    d.cancel().unwrap();
    reporter.send(StatusUpdate::from_deployment(&d));

    let diagnostics = reporter.finish(Duration::from_secs(2)).await;

    assert!(!diagnostics.has_warnings());
    let observed = control_plane.observed(d.id()).unwrap();
    assert_eq!(observed.status, DeploymentStatus::Cancelled);
    assert_eq!(control_plane.report_calls(), 4);
}

#[tokio::test]
async fn reporter_gives_up_after_max_attempts() {
    let control_plane = Arc::new(MemoryControlPlane::new());
    control_plane.fail_next_reports(10);
    let reporter = Reporter::spawn(Arc::clone(&control_plane), fast_retry(3));

    let d = deployment("d-4");
    reporter.send(StatusUpdate::from_deployment(&d));
    let diagnostics = reporter.finish(Duration::from_secs(2)).await;

    assert_eq!(control_plane.report_calls(), 3);
    assert_eq!(diagnostics.warnings().len(), 1);
    assert_eq!(diagnostics.warnings()[0].kind, WarningKind::ReportDropped);
}

#[tokio::test]
async fn listener_forwards_polled_commands() {
    let control_plane = Arc::new(MemoryControlPlane::new());
    let id = DeploymentId::new("d-5");
    control_plane.push_command(&id, ExternalCommand::approve(0).with_id("a"));
    control_plane.push_command(&id, ExternalCommand::skip(1).with_id("b"));

    let (tx, mut rx) = mpsc::channel(1);
    let stop = CancelHandle::new();
    let listener = CommandListener::spawn(
        Arc::clone(&control_plane),
        id.clone(),
        Duration::from_millis(10),
        tx,
        stop.signal(),
    );

    let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    let second = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, ExternalCommand::approve(0).with_id("a"));
    assert_eq!(second, ExternalCommand::skip(1).with_id("b"));

    stop.cancel();
    let diagnostics = listener.await.unwrap();
    assert!(!diagnostics.has_warnings());
}

#[tokio::test]
async fn unflushed_updates_are_dropped_after_timeout() {
    let control_plane = Arc::new(MemoryControlPlane::new());
    control_plane.fail_next_reports(100);
    let slow_retry = ReportRetryConfig {
        max_attempts: 5,
        initial_backoff: Duration::from_secs(1),
        max_backoff: Duration::from_secs(1),
    };
    let reporter = Reporter::spawn(Arc::clone(&control_plane), slow_retry);

    reporter.send(StatusUpdate::from_deployment(&deployment("d-6")));
    let diagnostics = reporter.finish(Duration::from_millis(50)).await;

    assert_eq!(diagnostics.warnings().len(), 1);
    let warning = &diagnostics.warnings()[0];
    assert_eq!(warning.kind, WarningKind::ReportDropped);
    assert!(warning.message.contains("50ms"), "{}", warning.message);
}
