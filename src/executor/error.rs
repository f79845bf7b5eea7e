// ABOUTME: Error types returned by platform executors.
// ABOUTME: The failure kind decides whether the engine retries a stage.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors a platform executor reports for one stage attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutorError {
    /// Network trouble or a timeout; eligible for retry.
    #[error("transient error: {0}")]
    Transient(String),

    /// Bad manifest or missing tool; never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The target platform refused the change; never retried.
    #[error("platform rejected the change: {0}")]
    PlatformRejected(String),

    /// The executor stopped because cancellation was signaled.
    #[error("cancelled")]
    Cancelled,
}

impl ExecutorError {
    pub fn transient(message: impl Into<String>) -> Self {
        ExecutorError::Transient(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        ExecutorError::Configuration(message.into())
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        ExecutorError::PlatformRejected(message.into())
    }

    /// Failure kind recorded on the stage, `None` for cancellation.
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            ExecutorError::Transient(_) => Some(FailureKind::Transient),
            ExecutorError::Configuration(_) => Some(FailureKind::Configuration),
            ExecutorError::PlatformRejected(_) => Some(FailureKind::PlatformRejected),
            ExecutorError::Cancelled => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ExecutorError::Transient(_))
    }
}

/// Why a stage attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    Transient,
    Configuration,
    PlatformRejected,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Transient => write!(f, "transient"),
            FailureKind::Configuration => write!(f, "configuration"),
            FailureKind::PlatformRejected => write!(f, "platform rejected"),
        }
    }
}
