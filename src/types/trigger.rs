// ABOUTME: Trigger context handed to the engine by the source-control resolver.
// ABOUTME: Carries the commit, changed paths, and what is currently deployed.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::artifact::ArtifactReference;

/// What is live on the platform before this deployment.
///
/// Platform rollback operations restore this state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningState {
    pub commit: String,
    #[serde(default)]
    pub artifact: Option<ArtifactReference>,
    /// Checkout of the running commit's application directory.
    #[serde(default)]
    pub source_dir: Option<PathBuf>,
}

/// A resolved `(commit, changed paths)` trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerContext {
    /// Full commit hash; empty for triggers that do not come from Git.
    pub commit: String,
    #[serde(default)]
    pub changed_paths: Vec<PathBuf>,
    #[serde(default)]
    pub running: Option<RunningState>,
}

impl TriggerContext {
    pub fn new(commit: impl Into<String>) -> Self {
        Self {
            commit: commit.into(),
            ..Default::default()
        }
    }

    pub fn with_changed_paths(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.changed_paths = paths.into_iter().collect();
        self
    }

    pub fn with_running(mut self, running: RunningState) -> Self {
        self.running = Some(running);
        self
    }

    /// Whether this trigger touches the application or one of its dependencies.
    ///
    /// A trigger without changed paths (manual sync, non-Git source) always
    /// triggers.
    pub fn triggers(&self, app_dir: &Path, dependencies: &[PathBuf]) -> bool {
        if self.changed_paths.is_empty() {
            return true;
        }

        self.changed_paths.iter().any(|changed| {
            changed.starts_with(app_dir) || dependencies.iter().any(|dep| changed.starts_with(dep))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_change_set_always_triggers() {
        let trigger = TriggerContext::new("abc");
        assert!(trigger.triggers(Path::new("apps/web"), &[]));
    }

    #[test]
    fn dependency_changes_trigger() {
        let trigger = TriggerContext::new("abc")
            .with_changed_paths([PathBuf::from("modules/vpc/main.tf")]);

        assert!(!trigger.triggers(Path::new("apps/web"), &[]));
        assert!(trigger.triggers(Path::new("apps/web"), &[PathBuf::from("modules/vpc")]));
    }

    #[test]
    fn prefix_match_is_per_component() {
        let trigger =
            TriggerContext::new("abc").with_changed_paths([PathBuf::from("apps/web-admin/a.yaml")]);
        assert!(!trigger.triggers(Path::new("apps/web"), &[]));
    }
}
