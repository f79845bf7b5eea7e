// ABOUTME: Error types for the pipeline execution controller.
// ABOUTME: Stage failures are deployment state, not errors; these cover run aborts.

use super::deployment::DeploymentTransitionError;
use super::stage::TransitionError;

/// Why a controller run stopped without a terminal deployment.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// Shutdown was signaled; the deployment was left non-terminal.
    #[error("shutting down with deployment {deployment} still in progress")]
    ShuttingDown { deployment: String },

    /// The controller attempted an invalid stage transition.
    #[error(transparent)]
    Stage(#[from] TransitionError),

    #[error(transparent)]
    Deployment(#[from] DeploymentTransitionError),

    /// A stage index missing from the plan.
    #[error("stage {0} is not part of the plan")]
    UnknownStage(u32),
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerErrorKind {
    ShuttingDown,
    InvalidTransition,
}

impl ControllerError {
    pub fn kind(&self) -> ControllerErrorKind {
        match self {
            ControllerError::ShuttingDown { .. } => ControllerErrorKind::ShuttingDown,
            ControllerError::Stage(_)
            | ControllerError::Deployment(_)
            | ControllerError::UnknownStage(_) => ControllerErrorKind::InvalidTransition,
        }
    }
}
