// ABOUTME: Application-wide error types for stagehand.
// ABOUTME: Uses thiserror for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

use crate::deploy::{ControllerError, DeploymentStatus};
use crate::plan::PlanError;
use crate::revision::RevisionError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Revision(#[from] RevisionError),

    #[error("invalid pipeline: {0}")]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Controller(#[from] ControllerError),

    #[error("deployment {deployment} finished {status}")]
    DeploymentFailed {
        deployment: String,
        status: DeploymentStatus,
    },

    #[error("deployment {deployment} failed and was rolled back")]
    RolledBack { deployment: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
