// ABOUTME: Diagnostics accumulator for non-fatal warnings during a deployment run.
// ABOUTME: Reporting and polling problems land here instead of failing the pipeline.

/// Collects non-fatal warnings during a deployment run.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    /// Take over warnings collected elsewhere without logging them again.
    pub fn merge(&mut self, other: Diagnostics) {
        self.warnings.extend(other.warnings);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// A non-fatal warning collected during a run.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// A status update that could not be delivered.
    pub fn report_dropped(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::ReportDropped,
            message: message.into(),
        }
    }

    pub fn command_poll_failed(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::CommandPollFailed,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Retries exhausted or a permanent rejection; the control plane missed a transition.
    ReportDropped,
    /// The control plane could not be polled for commands.
    CommandPollFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_starts_empty() {
        let diag = Diagnostics::default();
        assert!(!diag.has_warnings());
    }

    #[test]
    fn merge_keeps_order() {
        let mut a = Diagnostics::default();
        a.warn(Warning::report_dropped("first"));
        let mut b = Diagnostics::default();
        b.warn(Warning::command_poll_failed("second"));

        a.merge(b);
        let kinds: Vec<_> = a.warnings().iter().map(|w| w.kind).collect();
        assert_eq!(
            kinds,
            vec![WarningKind::ReportDropped, WarningKind::CommandPollFailed]
        );
    }
}
