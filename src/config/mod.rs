// ABOUTME: Configuration types and parsing for stagehand.yml and deployment manifests.
// ABOUTME: Handles YAML parsing, env-backed secrets, and per-platform overrides.

mod deserialize;
mod env_value;
mod init;
mod manifest;
mod platform;

pub use env_value::EnvValue;
pub use init::init_config;
pub use manifest::{
    DeploymentSpec, KubernetesInput, LambdaInput, REQUIRES_APPROVAL, RETRIES, RetryPolicy,
    StageKind, StageOptions, StageSpec, Target, TerraformInput,
};
pub use platform::{Platform, PlatformDefaults};

use crate::error::{Error, Result};
use crate::types::AgentId;
use deserialize::{deserialize_address, deserialize_nonzero_duration};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "stagehand.yml";
pub const CONFIG_FILENAME_ALT: &str = "stagehand.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".stagehand/config.yml";

/// Agent configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_agent_id")]
    pub agent_id: AgentId,

    /// Without a control plane, runs report to an in-process store.
    #[serde(default)]
    pub control_plane: Option<ControlPlaneConfig>,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub platforms: HashMap<Platform, PlatformConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControlPlaneConfig {
    #[serde(deserialize_with = "deserialize_address")]
    pub address: String,

    #[serde(default)]
    pub api_key: Option<EnvValue>,

    #[serde(
        default = "default_poll_interval",
        deserialize_with = "deserialize_nonzero_duration"
    )]
    pub poll_interval: Duration,

    /// Upper bound on a single control plane call.
    #[serde(
        default = "default_request_timeout",
        deserialize_with = "deserialize_nonzero_duration"
    )]
    pub request_timeout: Duration,

    #[serde(default)]
    pub report_retry: ReportRetryConfig,
}

/// Backoff for status delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ReportRetryConfig {
    #[serde(default = "default_report_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff", with = "humantime_serde")]
    pub initial_backoff: Duration,
    #[serde(default = "default_max_backoff", with = "humantime_serde")]
    pub max_backoff: Duration,
}

impl Default for ReportRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_report_attempts(),
            initial_backoff: default_initial_backoff(),
            max_backoff: default_max_backoff(),
        }
    }
}

impl ReportRetryConfig {
    /// Delay before retry number `retry` (0-based), doubling up to `max_backoff`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_tools_dir")]
    pub dir: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            dir: default_tools_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Pause between a transient failure and the next attempt.
    #[serde(default = "default_retry_delay", with = "humantime_serde")]
    pub retry_delay: Duration,

    /// How long to wait for queued status updates after the run ends.
    #[serde(default = "default_report_flush_timeout", with = "humantime_serde")]
    pub report_flush_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry_delay: default_retry_delay(),
            report_flush_timeout: default_report_flush_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlatformConfig {
    #[serde(default, with = "humantime_serde")]
    pub grace_period: Option<Duration>,
}

fn default_agent_id() -> AgentId {
    AgentId::new(gethostname::gethostname().to_string_lossy())
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_report_attempts() -> u32 {
    5
}

fn default_initial_backoff() -> Duration {
    Duration::from_millis(500)
}

fn default_max_backoff() -> Duration {
    Duration::from_secs(30)
}

fn default_tools_dir() -> PathBuf {
    PathBuf::from(".stagehand/tools")
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_report_flush_timeout() -> Duration {
    Duration::from_secs(10)
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Like `discover`, but falls back to defaults when no file exists.
    pub fn discover_or_default(dir: &Path) -> Result<Self> {
        match Self::discover(dir) {
            Err(Error::ConfigNotFound(_)) => Ok(Self::template()),
            other => other,
        }
    }

    /// Cancellation grace period for a platform, honoring overrides.
    pub fn grace_period(&self, platform: Platform) -> Duration {
        self.platforms
            .get(&platform)
            .and_then(|p| p.grace_period)
            .unwrap_or(platform.defaults().grace_period)
    }

    pub fn template() -> Self {
        Config {
            agent_id: default_agent_id(),
            control_plane: None,
            tools: ToolsConfig::default(),
            engine: EngineConfig::default(),
            platforms: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let retry = ReportRetryConfig {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
        };
        assert_eq!(retry.backoff(0), Duration::from_millis(100));
        assert_eq!(retry.backoff(1), Duration::from_millis(200));
        assert_eq!(retry.backoff(2), Duration::from_millis(350));
        assert_eq!(retry.backoff(40), Duration::from_millis(350));
    }

    #[test]
    fn grace_period_override() {
        let config = Config::from_yaml("platforms:\n  terraform:\n    grace_period: 2m\n").unwrap();
        assert_eq!(
            config.grace_period(Platform::Terraform),
            Duration::from_secs(120)
        );
        assert_eq!(
            config.grace_period(Platform::Lambda),
            Platform::Lambda.defaults().grace_period
        );
    }

    #[test]
    fn address_requires_port() {
        let err = Config::from_yaml("control_plane:\n  address: example.com\n").unwrap_err();
        assert!(err.to_string().contains("host:port"));
    }

    #[test]
    fn zero_poll_interval_rejected() {
        let err = Config::from_yaml(
            "control_plane:\n  address: localhost:8080\n  poll_interval: 0s\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn control_plane_timings() {
        let yaml = r#"
control_plane:
  address: localhost:8080
  poll_interval: 250ms
  request_timeout: 3s
"#;
        let config = Config::from_yaml(yaml).unwrap();
        let cp = config.control_plane.unwrap();
        assert_eq!(cp.poll_interval, Duration::from_millis(250));
        assert_eq!(cp.request_timeout, Duration::from_secs(3));
    }
}
