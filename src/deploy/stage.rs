// ABOUTME: Runtime stage instance and its state machine.
// ABOUTME: Invalid transitions are rejected and leave the stage untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::state::StageStatus;
use crate::config::{StageKind, StageOptions, StageSpec};
use crate::executor::FailureKind;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("stage {index}: cannot transition from {from} to {to}")]
pub struct TransitionError {
    pub index: u32,
    pub from: StageStatus,
    pub to: StageStatus,
}

/// Recorded cause of a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageError {
    pub kind: FailureKind,
    pub message: String,
}

/// One stage of one deployment run.
#[derive(Debug, Clone, PartialEq)]
pub struct StageInstance {
    index: u32,
    kind: StageKind,
    options: StageOptions,
    max_retries: u32,
    status: StageStatus,
    attempt: u32,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    error: Option<StageError>,
}

impl StageInstance {
    pub fn new(spec: StageSpec, max_retries: u32) -> Self {
        Self {
            index: spec.index,
            kind: spec.kind,
            options: spec.options,
            max_retries,
            status: StageStatus::Pending,
            attempt: 0,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn kind(&self) -> StageKind {
        self.kind
    }

    pub fn options(&self) -> &StageOptions {
        &self.options
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn status(&self) -> StageStatus {
        self.status
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn error(&self) -> Option<&StageError> {
        self.error.as_ref()
    }

    pub fn requires_approval(&self) -> bool {
        self.options.requires_approval()
    }

    /// A failed attempt that the retry policy allows to run again.
    pub fn can_retry(&self) -> bool {
        self.status == StageStatus::Failure
            && self.attempt < self.max_retries
            && self
                .error
                .as_ref()
                .is_some_and(|e| e.kind == FailureKind::Transient)
    }

    /// PENDING → RUNNING
    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.expect(&[StageStatus::Pending], StageStatus::Running)?;
        self.status = StageStatus::Running;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// RUNNING → SUCCESS
    pub fn succeed(&mut self) -> Result<(), TransitionError> {
        self.finish(&[StageStatus::Running], StageStatus::Success)
    }

    /// RUNNING → FAILURE
    pub fn fail(
        &mut self,
        kind: FailureKind,
        message: impl Into<String>,
    ) -> Result<(), TransitionError> {
        self.finish(&[StageStatus::Running], StageStatus::Failure)?;
        self.error = Some(StageError {
            kind,
            message: message.into(),
        });
        Ok(())
    }

    /// PENDING | RUNNING → SKIPPED
    pub fn skip(&mut self) -> Result<(), TransitionError> {
        self.finish(
            &[StageStatus::Pending, StageStatus::Running],
            StageStatus::Skipped,
        )
    }

    /// PENDING | RUNNING → CANCELLED
    pub fn cancel(&mut self) -> Result<(), TransitionError> {
        self.finish(
            &[StageStatus::Pending, StageStatus::Running],
            StageStatus::Cancelled,
        )
    }

    /// FAILURE → RUNNING with the next attempt number.
    pub fn retry(&mut self) -> Result<(), TransitionError> {
        if !self.can_retry() {
            return Err(self.invalid(StageStatus::Running));
        }
        self.status = StageStatus::Running;
        self.attempt += 1;
        self.finished_at = None;
        self.error = None;
        Ok(())
    }

    fn finish(&mut self, from: &[StageStatus], to: StageStatus) -> Result<(), TransitionError> {
        self.expect(from, to)?;
        self.status = to;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    fn expect(&self, from: &[StageStatus], to: StageStatus) -> Result<(), TransitionError> {
        if from.contains(&self.status) {
            Ok(())
        } else {
            Err(self.invalid(to))
        }
    }

    fn invalid(&self, to: StageStatus) -> TransitionError {
        TransitionError {
            index: self.index,
            from: self.status,
            to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(max_retries: u32) -> StageInstance {
        StageInstance::new(StageSpec::new(StageKind::Apply, 1), max_retries)
    }

    #[test]
    fn happy_path_sets_timestamps() {
        let mut s = stage(0);
        s.start().unwrap();
        assert!(s.started_at().is_some());
        assert!(s.finished_at().is_none());
        s.succeed().unwrap();
        assert_eq!(s.status(), StageStatus::Success);
        assert!(s.finished_at().is_some());
    }

    #[test]
    fn invalid_transition_leaves_state_unchanged() {
        let mut s = stage(0);
        let err = s.succeed().unwrap_err();
        assert_eq!(
            err,
            TransitionError {
                index: 1,
                from: StageStatus::Pending,
                to: StageStatus::Success
            }
        );
        assert_eq!(s.status(), StageStatus::Pending);
        assert!(s.started_at().is_none());
    }

    #[test]
    fn terminal_statuses_reject_cancel() {
        let mut s = stage(0);
        s.start().unwrap();
        s.succeed().unwrap();
        assert!(s.cancel().is_err());
        assert_eq!(s.status(), StageStatus::Success);
    }

    #[test]
    fn non_transient_failure_is_terminal() {
        let mut s = stage(3);
        s.start().unwrap();
        s.fail(FailureKind::PlatformRejected, "denied").unwrap();
        assert!(!s.can_retry());
        assert!(s.retry().is_err());
        assert_eq!(s.attempt(), 0);
    }

    #[test]
    fn retry_increments_attempt() {
        let mut s = stage(1);
        s.start().unwrap();
        s.fail(FailureKind::Transient, "timeout").unwrap();
        s.retry().unwrap();
        assert_eq!(s.status(), StageStatus::Running);
        assert_eq!(s.attempt(), 1);
        assert!(s.error().is_none());

        s.fail(FailureKind::Transient, "timeout").unwrap();
        assert!(!s.can_retry());
    }
}
