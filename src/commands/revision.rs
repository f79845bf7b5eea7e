// ABOUTME: Revision and tag inspection commands.
// ABOUTME: Prints what a manifest and commit resolve to without deploying.

use stagehand::config::DeploymentSpec;
use stagehand::error::{Error, Result};
use stagehand::output::Output;
use stagehand::revision::RevisionId;
use stagehand::types::find_image_tag;
use std::path::Path;

pub fn print_revision(manifest: &Path, commit: &str, output: &Output) -> Result<()> {
    let spec = DeploymentSpec::load(manifest)?;
    let revision = RevisionId::resolve(&spec, commit)?;
    output.success(revision.as_str());
    Ok(())
}

pub fn print_tag(reference: &str, output: &Output) -> Result<()> {
    let tag = find_image_tag(reference).map_err(|e| Error::InvalidConfig(e.to_string()))?;
    output.success(&tag);
    Ok(())
}
