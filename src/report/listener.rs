// ABOUTME: Background task polling the control plane for deployment commands.
// ABOUTME: Forwards commands over a bounded channel until told to stop.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::ControlPlane;
use crate::deploy::ExternalCommand;
use crate::diagnostics::{Diagnostics, Warning};
use crate::executor::CancelSignal;
use crate::types::DeploymentId;

/// Lower bound for the poll interval; a zero period would panic the ticker.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct CommandListener;

impl CommandListener {
    /// Poll every `interval` until `stop` fires or the receiver goes away.
    ///
    /// An in-flight poll is abandoned as soon as `stop` fires. A failing poll
    /// is logged and retried on the next tick; only the first failure of a
    /// streak is recorded as a warning.
    pub fn spawn<C>(
        control_plane: Arc<C>,
        deployment_id: DeploymentId,
        interval: Duration,
        tx: mpsc::Sender<ExternalCommand>,
        stop: CancelSignal,
    ) -> JoinHandle<Diagnostics>
    where
        C: ControlPlane + ?Sized + 'static,
    {
        tokio::spawn(async move {
            let mut diagnostics = Diagnostics::default();
            let mut ticker = tokio::time::interval(interval.max(MIN_POLL_INTERVAL));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut failing = false;

            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let polled = tokio::select! {
                    _ = stop.cancelled() => break,
                    polled = control_plane.poll_commands(&deployment_id) => polled,
                };

                let commands = match polled {
                    Ok(commands) => {
                        failing = false;
                        commands
                    }
                    Err(e) => {
                        if !failing {
                            diagnostics.warn(Warning::command_poll_failed(format!(
                                "polling commands for {deployment_id} failed: {e}"
                            )));
                        } else {
                            tracing::debug!("command poll still failing: {}", e);
                        }
                        failing = true;
                        continue;
                    }
                };

                for command in commands {
                    tracing::debug!("received {:?} for {}", command.kind, deployment_id);
                    tokio::select! {
                        sent = tx.send(command) => {
                            if sent.is_err() {
                                return diagnostics;
                            }
                        }
                        _ = stop.cancelled() => return diagnostics,
                    }
                }
            }

            diagnostics
        })
    }
}
