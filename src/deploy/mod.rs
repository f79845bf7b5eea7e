// ABOUTME: Deployment run state machine and the controller that drives it.
// ABOUTME: Exports stage/deployment aggregates, commands, and the pipeline controller.

mod command;
mod controller;
mod deployment;
mod error;
mod stage;
mod state;

pub use command::{CommandKind, ExternalCommand};
pub use controller::{ControllerConfig, PipelineController, RunOutcome};
pub use deployment::{Deployment, DeploymentTransitionError, FailureCause, derive_status};
pub use error::{ControllerError, ControllerErrorKind};
pub use stage::{StageError, StageInstance, TransitionError};
pub use state::{DeploymentStatus, StageStatus};
