// ABOUTME: Background task delivering status updates in order.
// ABOUTME: Retries retryable failures with exponential backoff and never blocks the pipeline.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{ControlPlane, StatusUpdate};
use crate::config::ReportRetryConfig;
use crate::diagnostics::{Diagnostics, Warning};

pub struct Reporter {
    tx: mpsc::UnboundedSender<StatusUpdate>,
    task: JoinHandle<Diagnostics>,
}

impl Reporter {
    pub fn spawn<C>(control_plane: Arc<C>, retry: ReportRetryConfig) -> Self
    where
        C: ControlPlane + ?Sized + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<StatusUpdate>();
        let task = tokio::spawn(async move {
            let mut diagnostics = Diagnostics::default();
            while let Some(update) = rx.recv().await {
                deliver(control_plane.as_ref(), &retry, &update, &mut diagnostics).await;
            }
            diagnostics
        });
        Self { tx, task }
    }

    /// Queue an update; returns immediately.
    pub fn send(&self, update: StatusUpdate) {
        if self.tx.send(update).is_err() {
            tracing::warn!("status reporter stopped; update not queued");
        }
    }

    /// Stop accepting updates and wait for queued ones to be delivered.
    pub async fn finish(self, timeout: Duration) -> Diagnostics {
        let Reporter { tx, task } = self;
        drop(tx);

        let abort = task.abort_handle();
        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(diagnostics)) => diagnostics,
            Ok(Err(e)) => {
                let mut diagnostics = Diagnostics::default();
                diagnostics.warn(Warning::report_dropped(format!("status reporter failed: {e}")));
                diagnostics
            }
            Err(_) => {
                abort.abort();
                let mut diagnostics = Diagnostics::default();
                diagnostics.warn(Warning::report_dropped(format!(
                    "status updates still queued after {:?} were dropped",
                    timeout
                )));
                diagnostics
            }
        }
    }
}

async fn deliver<C>(
    control_plane: &C,
    retry: &ReportRetryConfig,
    update: &StatusUpdate,
    diagnostics: &mut Diagnostics,
) where
    C: ControlPlane + ?Sized,
{
    let mut attempt = 0;
    loop {
        match control_plane.report_deployment_status(update).await {
            Ok(()) => {
                tracing::debug!(
                    "reported {} as {}",
                    update.deployment_id,
                    update.status
                );
                return;
            }
            Err(e) if e.is_retryable() && attempt + 1 < retry.max_attempts => {
                let delay = retry.backoff(attempt);
                tracing::warn!(
                    "status report failed (attempt {}): {}; retrying in {:?}",
                    attempt + 1,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                diagnostics.warn(Warning::report_dropped(format!(
                    "dropped {} status update for {}: {}",
                    update.status, update.deployment_id, e
                )));
                return;
            }
        }
    }
}
