// ABOUTME: Revision naming for deployments from artifact reference and trigger commit.
// ABOUTME: Produces {application}-{normalizedTag}-{shortCommit} identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config::DeploymentSpec;
use crate::types::{ApplicationName, ArtifactReference, ParseImageRefError};

/// Length of the abbreviated commit hash in a revision name.
pub const SHORT_COMMIT_LEN: usize = 7;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RevisionError {
    #[error("invalid artifact reference {reference:?}: {source}")]
    InvalidArtifactReference {
        reference: String,
        #[source]
        source: ParseImageRefError,
    },
}

/// Human-legible identifier of one deployable artifact plus trigger.
///
/// Uniqueness is best effort: two deployments of the same application and
/// tag whose commits share a 7-character prefix collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionId(String);

impl RevisionId {
    /// Resolve the revision for a deployment triggered by `commit`.
    ///
    /// An empty commit is valid (non-Git triggers) and yields a trailing
    /// empty segment.
    pub fn resolve(spec: &DeploymentSpec, commit: &str) -> Result<Self, RevisionError> {
        decide_revision_name(&spec.application, &spec.artifact, commit).map(RevisionId)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Build the revision name without a full deployment spec.
pub fn decide_revision_name(
    application: &ApplicationName,
    artifact: &ArtifactReference,
    commit: &str,
) -> Result<String, RevisionError> {
    let (_, tag) =
        artifact
            .name_and_tag()
            .map_err(|source| RevisionError::InvalidArtifactReference {
                reference: artifact.to_string(),
                source,
            })?;

    Ok(format!(
        "{}-{}-{}",
        application,
        tag.replace('.', ""),
        short_commit(commit)
    ))
}

/// First 7 characters of a commit hash, or the whole string when shorter.
pub fn short_commit(commit: &str) -> &str {
    match commit.char_indices().nth(SHORT_COMMIT_LEN) {
        Some((end, _)) => &commit[..end],
        None => commit,
    }
}
