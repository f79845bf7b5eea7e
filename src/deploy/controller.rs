// ABOUTME: Pipeline execution controller driving one deployment run.
// ABOUTME: Runs stages in order, applies external commands, rolls back, and streams status.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use super::command::{CommandKind, ExternalCommand};
use super::deployment::{Deployment, FailureCause};
use super::error::ControllerError;
use super::stage::StageInstance;
use super::state::{DeploymentStatus, StageStatus};
use crate::config::{Config, Platform, ReportRetryConfig};
use crate::diagnostics::Diagnostics;
use crate::executor::{
    CancelHandle, CancelSignal, DeploymentContext, ExecutorError, FailureKind, StageContext,
    StageExecutor, StageResult,
};
use crate::report::{CommandListener, ControlPlane, Reporter, StatusUpdate};
use crate::types::CommandId;

/// Commands buffered between the listener and the controller.
const COMMAND_BUFFER: usize = 1;

/// How long the command listener gets to exit once the run is over.
const LISTENER_STOP_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// How long an executor gets to stop after its cancel signal fires.
    pub grace_period: Duration,
    /// Pause between a transient failure and the next attempt.
    pub retry_delay: Duration,
    pub poll_interval: Duration,
    pub report_retry: ReportRetryConfig,
    /// How long to wait for queued status updates once the run ends.
    pub report_flush_timeout: Duration,
}

impl ControllerConfig {
    /// Defaults for the platform, without an agent config file.
    pub fn for_platform(platform: Platform) -> Self {
        Self::from_config(&Config::template(), platform)
    }

    pub fn from_config(config: &Config, platform: Platform) -> Self {
        let (poll_interval, report_retry) = match config.control_plane {
            Some(ref cp) => (cp.poll_interval, cp.report_retry),
            None => (Duration::from_secs(5), ReportRetryConfig::default()),
        };
        Self {
            grace_period: config.grace_period(platform),
            retry_delay: config.engine.retry_delay,
            poll_interval,
            report_retry,
            report_flush_timeout: config.engine.report_flush_timeout,
        }
    }
}

/// A finished run: the terminal deployment and any reporting warnings.
#[derive(Debug)]
pub struct RunOutcome {
    pub deployment: Deployment,
    pub diagnostics: Diagnostics,
}

/// Why an in-flight stage was interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Preempt {
    Cancel,
    Skip,
    Shutdown,
}

enum Gate {
    Open,
    Skip,
    Cancel,
}

enum Attempt {
    Done,
    Cancelled,
    Failed(FailureCause),
}

enum Event {
    Finished(Result<StageResult, ExecutorError>),
    Command(ExternalCommand),
    Shutdown,
    GraceElapsed,
}

enum Wake {
    Command(ExternalCommand),
    Shutdown,
    Elapsed,
}

/// Owns one deployment run from PENDING to a terminal status.
pub struct PipelineController<E: ?Sized, C: ?Sized> {
    deployment: Deployment,
    context: Arc<DeploymentContext>,
    executor: Arc<E>,
    control_plane: Arc<C>,
    config: ControllerConfig,
    commands_tx: mpsc::Sender<ExternalCommand>,
    commands_rx: mpsc::Receiver<ExternalCommand>,
    snapshots: watch::Sender<Deployment>,
    reporter: Option<Reporter>,
    seen_commands: HashSet<CommandId>,
    approved: HashSet<u32>,
    skip_requests: BTreeSet<u32>,
    awaiting_approval: Option<u32>,
    cancel_requested: bool,
}

impl<E, C> PipelineController<E, C>
where
    E: StageExecutor + ?Sized + 'static,
    C: ControlPlane + ?Sized + 'static,
{
    pub fn new(
        deployment: Deployment,
        context: DeploymentContext,
        executor: Arc<E>,
        control_plane: Arc<C>,
        config: ControllerConfig,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (snapshots, _) = watch::channel(deployment.clone());
        Self {
            deployment,
            context: Arc::new(context),
            executor,
            control_plane,
            config,
            commands_tx,
            commands_rx,
            snapshots,
            reporter: None,
            seen_commands: HashSet::new(),
            approved: HashSet::new(),
            skip_requests: BTreeSet::new(),
            awaiting_approval: None,
            cancel_requested: false,
        }
    }

    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    /// Snapshots published after every transition.
    pub fn subscribe(&self) -> watch::Receiver<Deployment> {
        self.snapshots.subscribe()
    }

    /// Inject commands locally, alongside those polled from the control plane.
    pub fn command_sender(&self) -> mpsc::Sender<ExternalCommand> {
        self.commands_tx.clone()
    }

    /// Drive the deployment to a terminal status.
    ///
    /// When `shutdown` fires the in-flight stage is signaled and the run
    /// stops with `ControllerError::ShuttingDown`, leaving the deployment
    /// non-terminal.
    pub async fn run(mut self, shutdown: CancelSignal) -> Result<RunOutcome, ControllerError> {
        self.reporter = Some(Reporter::spawn(
            Arc::clone(&self.control_plane),
            self.config.report_retry,
        ));

        let listener_stop = CancelHandle::new();
        let listener = CommandListener::spawn(
            Arc::clone(&self.control_plane),
            self.deployment.id().clone(),
            self.config.poll_interval,
            self.commands_tx.clone(),
            listener_stop.signal(),
        );

        let result = self.drive(&shutdown).await;

        listener_stop.cancel();
        let mut diagnostics = Diagnostics::default();
        let abort = listener.abort_handle();
        match tokio::time::timeout(LISTENER_STOP_TIMEOUT, listener).await {
            Ok(Ok(listener_diagnostics)) => diagnostics.merge(listener_diagnostics),
            Ok(Err(e)) => tracing::warn!("command listener failed: {}", e),
            Err(_) => {
                abort.abort();
                tracing::warn!(
                    "command listener did not stop within {:?}; abandoned",
                    LISTENER_STOP_TIMEOUT
                );
            }
        }
        if let Some(reporter) = self.reporter.take() {
            diagnostics.merge(reporter.finish(self.config.report_flush_timeout).await);
        }

        result?;
        Ok(RunOutcome {
            deployment: self.deployment,
            diagnostics,
        })
    }

    async fn drive(&mut self, shutdown: &CancelSignal) -> Result<(), ControllerError> {
        self.deployment.start()?;
        tracing::info!(
            "deployment {} started: {} stage(s), revision {}",
            self.deployment.id(),
            self.deployment.stages().len(),
            self.deployment.revision()
        );
        self.publish();

        loop {
            self.drain_commands();
            if self.cancel_requested {
                return self.cancel_deployment();
            }

            let Some(index) = self.deployment.next_pending() else {
                break;
            };

            if self.skip_requests.remove(&index) {
                self.skip_pending(index)?;
                continue;
            }

            if self.stage(index)?.requires_approval() && !self.approved.contains(&index) {
                match self.await_approval(index, shutdown).await? {
                    Gate::Open => {}
                    Gate::Skip => {
                        self.skip_pending(index)?;
                        continue;
                    }
                    Gate::Cancel => return self.cancel_deployment(),
                }
            }

            match self.run_stage(index, shutdown).await? {
                Attempt::Done => {}
                Attempt::Cancelled => return self.cancel_deployment(),
                Attempt::Failed(cause) => return self.handle_failure(cause, shutdown).await,
            }
        }

        let status = self.deployment.complete();
        tracing::info!("deployment {} finished: {}", self.deployment.id(), status);
        self.publish();
        Ok(())
    }

    /// Run one stage through all of its attempts.
    async fn run_stage(
        &mut self,
        index: u32,
        shutdown: &CancelSignal,
    ) -> Result<Attempt, ControllerError> {
        self.stage_mut(index)?.start()?;
        tracing::info!("stage {} ({}) started", index, self.stage(index)?.kind());
        self.publish();

        loop {
            let stage_cancel = CancelHandle::new();
            let ctx = StageContext::new(stage_cancel.signal(), self.config.grace_period);
            let stage = self.stage(index)?.clone();
            let executor = Arc::clone(&self.executor);
            let deployment = Arc::clone(&self.context);
            let execution = async move { executor.execute(&ctx, &stage, &deployment).await };
            tokio::pin!(execution);

            let grace = tokio::time::sleep(self.config.grace_period);
            tokio::pin!(grace);
            let mut preempt: Option<Preempt> = None;

            let finished = loop {
                let event = tokio::select! {
                    result = &mut execution => Event::Finished(result),
                    Some(command) = self.commands_rx.recv(), if preempt.is_none() => {
                        Event::Command(command)
                    }
                    _ = shutdown.cancelled(), if preempt.is_none() => Event::Shutdown,
                    _ = &mut grace, if preempt.is_some() => Event::GraceElapsed,
                };

                match event {
                    Event::Finished(result) => break Some(result),
                    Event::GraceElapsed => {
                        tracing::warn!(
                            "stage {} did not stop within {:?}; abandoning it",
                            index,
                            self.config.grace_period
                        );
                        break None;
                    }
                    Event::Command(command) => preempt = self.accept(command),
                    Event::Shutdown => preempt = Some(Preempt::Shutdown),
                }

                if preempt.is_some() && !stage_cancel.is_cancelled() {
                    stage_cancel.cancel();
                    grace
                        .as_mut()
                        .reset(Instant::now() + self.config.grace_period);
                }
            };

            match preempt {
                Some(Preempt::Shutdown) => return Err(self.shutting_down()),
                Some(Preempt::Cancel) => return Ok(Attempt::Cancelled),
                Some(Preempt::Skip) => {
                    self.stage_mut(index)?.skip()?;
                    tracing::info!("stage {} skipped while running", index);
                    self.publish();
                    return Ok(Attempt::Done);
                }
                None => {}
            }

            let error = match finished.unwrap_or(Err(ExecutorError::Cancelled)) {
                Ok(StageResult::Success) => {
                    self.stage_mut(index)?.succeed()?;
                    tracing::info!("stage {} succeeded", index);
                    self.publish();
                    return Ok(Attempt::Done);
                }
                Ok(StageResult::Skipped) => {
                    self.stage_mut(index)?.skip()?;
                    tracing::info!("stage {} had nothing to do", index);
                    self.publish();
                    return Ok(Attempt::Done);
                }
                Ok(StageResult::Failure) => ExecutorError::rejected("executor reported failure"),
                Err(ExecutorError::Cancelled) => {
                    ExecutorError::transient("executor stopped without a cancellation request")
                }
                Err(e) => e,
            };

            let kind = error.kind().unwrap_or(FailureKind::Transient);
            let message = error.to_string();
            let stage = self.stage_mut(index)?;
            stage.fail(kind, message.clone())?;
            let attempt = stage.attempt();
            let can_retry = stage.can_retry();
            self.publish();

            if !can_retry {
                tracing::error!("stage {} failed: {}", index, message);
                return Ok(Attempt::Failed(FailureCause {
                    stage_index: index,
                    kind,
                    message,
                }));
            }

            tracing::warn!(
                "stage {} attempt {} failed: {}; retrying",
                index,
                attempt,
                message
            );
            if !self.pause_before_retry(shutdown).await? {
                return Ok(Attempt::Cancelled);
            }
            self.stage_mut(index)?.retry()?;
            self.publish();
        }
    }

    /// Sleep `retry_delay` while still listening for commands.
    ///
    /// Returns false when a CANCEL arrived instead.
    async fn pause_before_retry(
        &mut self,
        shutdown: &CancelSignal,
    ) -> Result<bool, ControllerError> {
        let delay = tokio::time::sleep(self.config.retry_delay);
        tokio::pin!(delay);

        loop {
            if self.cancel_requested {
                return Ok(false);
            }
            let wake = tokio::select! {
                _ = &mut delay => Wake::Elapsed,
                Some(command) = self.commands_rx.recv() => Wake::Command(command),
                _ = shutdown.cancelled() => Wake::Shutdown,
            };
            match wake {
                Wake::Elapsed => return Ok(true),
                Wake::Command(command) => {
                    self.accept(command);
                }
                Wake::Shutdown => return Err(self.shutting_down()),
            }
        }
    }

    /// Block a manual-gate stage until APPROVE, SKIP, or CANCEL. No timeout.
    async fn await_approval(
        &mut self,
        index: u32,
        shutdown: &CancelSignal,
    ) -> Result<Gate, ControllerError> {
        self.awaiting_approval = Some(index);
        tracing::info!("stage {} waiting for approval", index);

        let gate = loop {
            if self.cancel_requested {
                break Gate::Cancel;
            }
            if self.skip_requests.remove(&index) {
                break Gate::Skip;
            }
            if self.approved.contains(&index) {
                break Gate::Open;
            }

            let wake = tokio::select! {
                Some(command) = self.commands_rx.recv() => Wake::Command(command),
                _ = shutdown.cancelled() => Wake::Shutdown,
            };
            match wake {
                Wake::Command(command) => {
                    self.accept(command);
                }
                Wake::Shutdown | Wake::Elapsed => {
                    self.awaiting_approval = None;
                    return Err(self.shutting_down());
                }
            }
        };

        self.awaiting_approval = None;
        Ok(gate)
    }

    async fn handle_failure(
        &mut self,
        cause: FailureCause,
        shutdown: &CancelSignal,
    ) -> Result<(), ControllerError> {
        let stage_index = cause.stage_index;
        let status = self.deployment.record_failure(cause)?;
        self.publish();

        if status != DeploymentStatus::RollingBack {
            tracing::error!(
                "deployment {} failed at stage {}",
                self.deployment.id(),
                stage_index
            );
            return Ok(());
        }

        tracing::warn!(
            "deployment {} rolling back after stage {} failed",
            self.deployment.id(),
            stage_index
        );
        let rollback = self.roll_back(shutdown).await?;
        let status = self.deployment.finish_rollback(rollback)?;
        tracing::info!(
            "deployment {} rollback finished: {}",
            self.deployment.id(),
            status
        );
        self.publish();
        Ok(())
    }

    /// Undo previously successful stages in reverse index order.
    ///
    /// The first failing inverse ends the rollback; it is never itself rolled back.
    async fn roll_back(
        &mut self,
        shutdown: &CancelSignal,
    ) -> Result<Result<(), FailureCause>, ControllerError> {
        for index in self.deployment.rollback_targets() {
            let stage = self.stage(index)?.clone();
            tracing::info!("rolling back stage {} ({})", index, stage.kind());

            let cancel = CancelHandle::new();
            let ctx = StageContext::new(cancel.signal(), self.config.grace_period);
            let executor = Arc::clone(&self.executor);
            let deployment = Arc::clone(&self.context);
            let rollback = async move { executor.rollback(&ctx, &stage, &deployment).await };
            tokio::pin!(rollback);

            let result = tokio::select! {
                result = &mut rollback => Some(result),
                _ = shutdown.cancelled() => None,
            };

            let Some(result) = result else {
                cancel.cancel();
                let _ = tokio::time::timeout(self.config.grace_period, &mut rollback).await;
                return Err(self.shutting_down());
            };

            if let Err(e) = result {
                tracing::error!("rollback of stage {} failed: {}", index, e);
                return Ok(Err(FailureCause {
                    stage_index: index,
                    kind: e.kind().unwrap_or(FailureKind::Transient),
                    message: e.to_string(),
                }));
            }
        }
        Ok(Ok(()))
    }

    /// Apply one command to controller state.
    ///
    /// Returns how the running stage must be interrupted, if at all.
    fn accept(&mut self, command: ExternalCommand) -> Option<Preempt> {
        if let Some(ref id) = command.id {
            if !self.seen_commands.insert(id.clone()) {
                tracing::debug!("ignoring duplicate command {}", id);
                return None;
            }
        }

        match command.kind {
            CommandKind::Cancel => {
                if self.deployment.status() != DeploymentStatus::Running {
                    tracing::info!(
                        "ignoring CANCEL for deployment in {}",
                        self.deployment.status()
                    );
                    return None;
                }
                if self.cancel_requested {
                    return None;
                }
                tracing::info!("cancel requested for {}", self.deployment.id());
                self.cancel_requested = true;
                Some(Preempt::Cancel)
            }
            CommandKind::Approve => {
                let target = command
                    .target_stage_index
                    .or(self.awaiting_approval)
                    .or_else(|| self.deployment.next_pending());
                if let Some(index) = target {
                    tracing::info!("stage {} approved", index);
                    self.approved.insert(index);
                }
                None
            }
            CommandKind::Skip => {
                let target = command
                    .target_stage_index
                    .or(self.awaiting_approval)
                    .or_else(|| self.deployment.running_stage())?;
                match self.deployment.stage(target).map(StageInstance::status) {
                    Some(StageStatus::Running) => {
                        tracing::info!("skipping running stage {}", target);
                        Some(Preempt::Skip)
                    }
                    Some(StageStatus::Pending) => {
                        tracing::info!("stage {} will be skipped", target);
                        self.skip_requests.insert(target);
                        None
                    }
                    Some(status) => {
                        tracing::debug!("ignoring SKIP for stage {} already {}", target, status);
                        None
                    }
                    None => {
                        tracing::warn!("SKIP targets unknown stage {}", target);
                        None
                    }
                }
            }
        }
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands_rx.try_recv() {
            self.accept(command);
        }
    }

    fn skip_pending(&mut self, index: u32) -> Result<(), ControllerError> {
        self.stage_mut(index)?.skip()?;
        tracing::info!("stage {} skipped", index);
        self.publish();
        Ok(())
    }

    fn cancel_deployment(&mut self) -> Result<(), ControllerError> {
        self.deployment.cancel()?;
        tracing::info!("deployment {} cancelled", self.deployment.id());
        self.publish();
        Ok(())
    }

    /// Queue the current state for reporting and local subscribers.
    fn publish(&self) {
        if let Some(ref reporter) = self.reporter {
            reporter.send(StatusUpdate::from_deployment(&self.deployment));
        }
        self.snapshots.send_replace(self.deployment.clone());
    }

    fn shutting_down(&self) -> ControllerError {
        tracing::warn!(
            "shutdown while deployment {} is {}",
            self.deployment.id(),
            self.deployment.status()
        );
        ControllerError::ShuttingDown {
            deployment: self.deployment.id().to_string(),
        }
    }

    fn stage(&self, index: u32) -> Result<&StageInstance, ControllerError> {
        self.deployment
            .stage(index)
            .ok_or(ControllerError::UnknownStage(index))
    }

    fn stage_mut(&mut self, index: u32) -> Result<&mut StageInstance, ControllerError> {
        self.deployment
            .stage_mut(index)
            .ok_or(ControllerError::UnknownStage(index))
    }
}
