// ABOUTME: Typed deployment manifest consumed by the engine.
// ABOUTME: Covers artifact, target platform input, pipeline stages, and rollback policy.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};

use super::deserialize::{deserialize_application_name, deserialize_pipeline};
use super::platform::Platform;
use crate::error::{Error, Result};
use crate::types::{ApplicationName, ArtifactReference};

/// Option key marking a stage as a manual gate.
pub const REQUIRES_APPROVAL: &str = "requiresApproval";
/// Option key overriding the deployment-wide retry count for one stage.
pub const RETRIES: &str = "retries";

/// A validated deployment specification.
///
/// Field-level validation of platform manifests happens before the engine
/// sees this type.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSpec {
    #[serde(deserialize_with = "deserialize_application_name")]
    pub application: ApplicationName,

    pub artifact: ArtifactReference,

    pub target: Target,

    /// `None` selects quick sync.
    #[serde(default, deserialize_with = "deserialize_pipeline")]
    pub pipeline: Option<Vec<StageSpec>>,

    /// Options for the synthetic quick-sync stage.
    #[serde(default)]
    pub quick_sync: StageOptions,

    #[serde(default)]
    pub auto_rollback: bool,

    #[serde(default)]
    pub retry_policy: RetryPolicy,

    /// Extra paths whose changes trigger this application.
    #[serde(default)]
    pub dependencies: Vec<PathBuf>,

    /// Directory the manifest was loaded from; platform paths are relative to it.
    #[serde(skip)]
    pub app_dir: PathBuf,
}

impl DeploymentSpec {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut spec = Self::from_yaml(&content)?;
        spec.app_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(spec)
    }

    pub fn platform(&self) -> Platform {
        self.target.platform()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    #[serde(default)]
    pub max_retries: u32,
}

/// Platform-specific deployment input, tagged by `platform`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "platform", rename_all = "lowercase")]
pub enum Target {
    Kubernetes(KubernetesInput),
    Lambda(LambdaInput),
    Terraform(TerraformInput),
}

impl Target {
    pub fn platform(&self) -> Platform {
        match self {
            Target::Kubernetes(_) => Platform::Kubernetes,
            Target::Lambda(_) => Platform::Lambda,
            Target::Terraform(_) => Platform::Terraform,
        }
    }

    /// Tool version requested by the manifest, `None` for the installed default.
    pub fn tool_version(&self) -> Option<&str> {
        match self {
            Target::Kubernetes(input) => input.kubectl_version.as_deref(),
            Target::Lambda(input) => input.aws_version.as_deref(),
            Target::Terraform(input) => input.terraform_version.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesInput {
    #[serde(default = "default_manifests_dir")]
    pub manifests: PathBuf,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub kubectl_version: Option<String>,
}

fn default_manifests_dir() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LambdaInput {
    /// Function to update; defaults to the application name.
    #[serde(default)]
    pub function_name: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub aws_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerraformInput {
    /// Empty means the "default" workspace.
    #[serde(default)]
    pub workspace: Option<String>,
    /// Empty means the pre-installed version.
    #[serde(default)]
    pub terraform_version: Option<String>,
    /// Passed with `-var`, formatted `key=value`.
    #[serde(default)]
    pub vars: Vec<String>,
    /// Passed with `-var-file`.
    #[serde(default)]
    pub var_files: Vec<String>,
}

/// Stage vocabulary shared by the platform executors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageKind {
    Sync,
    Plan,
    Apply,
    Wait,
    Rollback,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageKind::Sync => "SYNC",
            StageKind::Plan => "PLAN",
            StageKind::Apply => "APPLY",
            StageKind::Wait => "WAIT",
            StageKind::Rollback => "ROLLBACK",
        };
        f.write_str(name)
    }
}

/// One entry of `pipeline.stages`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StageSpec {
    pub kind: StageKind,
    #[serde(default, rename = "with", alias = "options")]
    pub options: StageOptions,
    /// Position in the pipeline, assigned from list order.
    #[serde(skip)]
    pub index: u32,
}

impl StageSpec {
    pub fn new(kind: StageKind, index: u32) -> Self {
        Self {
            kind,
            options: StageOptions::default(),
            index,
        }
    }

    pub fn with_options(mut self, options: StageOptions) -> Self {
        self.options = options;
        self
    }
}

/// Opaque per-kind stage configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageOptions(Map<String, Value>);

impl StageOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Manual gate: the stage waits for an APPROVE command before starting.
    pub fn requires_approval(&self) -> bool {
        self.get(REQUIRES_APPROVAL)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Per-stage retry override.
    pub fn retries(&self) -> Option<u32> {
        self.get(RETRIES)
            .and_then(Value::as_u64)
            .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
    }

    /// Decode the options into a kind-specific struct.
    pub fn parse<T: DeserializeOwned>(&self) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.0.clone()))
    }
}
