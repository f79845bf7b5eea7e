// ABOUTME: Tool registry client resolving installed platform CLIs.
// ABOUTME: Looks executables up by (platform, version); never downloads anything.

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::Platform;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("{tool} {version} is not installed in {dir}")]
    VersionNotInstalled {
        tool: &'static str,
        version: String,
        dir: PathBuf,
    },
}

#[async_trait]
pub trait ToolRegistry: Send + Sync {
    /// Path of an installed executable for the platform's tool.
    ///
    /// `None` asks for whatever version is installed.
    async fn resolve_executable(
        &self,
        platform: Platform,
        version: Option<&str>,
    ) -> Result<PathBuf, ToolError>;
}

/// Registry backed by a directory of pre-installed binaries.
///
/// Lookup order: `<dir>/<tool>-<version>`, then `<dir>/<tool>` when no
/// version is requested, then the bare tool name for `PATH` lookup.
#[derive(Debug, Clone)]
pub struct LocalToolRegistry {
    dir: PathBuf,
}

impl LocalToolRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl ToolRegistry for LocalToolRegistry {
    async fn resolve_executable(
        &self,
        platform: Platform,
        version: Option<&str>,
    ) -> Result<PathBuf, ToolError> {
        let tool = platform.defaults().tool;

        match version.filter(|v| !v.is_empty()) {
            Some(version) => {
                let path = self.dir.join(format!("{tool}-{version}"));
                if path.is_file() {
                    Ok(path)
                } else {
                    Err(ToolError::VersionNotInstalled {
                        tool,
                        version: version.to_string(),
                        dir: self.dir.clone(),
                    })
                }
            }
            None => {
                let path = self.dir.join(tool);
                if path.is_file() {
                    Ok(path)
                } else {
                    tracing::debug!("{tool} not in {}, using PATH", self.dir.display());
                    Ok(PathBuf::from(tool))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn versioned_lookup() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("terraform-1.5.7"), "").unwrap();
        let registry = LocalToolRegistry::new(dir.path());

        let path = registry
            .resolve_executable(Platform::Terraform, Some("1.5.7"))
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("terraform-1.5.7"));

        let err = registry
            .resolve_executable(Platform::Terraform, Some("1.6.0"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::VersionNotInstalled { tool: "terraform", .. }));
    }

    #[tokio::test]
    async fn unversioned_falls_back_to_path() {
        let dir = tempfile::tempdir().unwrap();
        let registry = LocalToolRegistry::new(dir.path());

        let path = registry
            .resolve_executable(Platform::Kubernetes, None)
            .await
            .unwrap();
        assert_eq!(path, PathBuf::from("kubectl"));

        std::fs::write(dir.path().join("kubectl"), "").unwrap();
        let path = registry
            .resolve_executable(Platform::Kubernetes, Some(""))
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("kubectl"));
    }
}
