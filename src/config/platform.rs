// ABOUTME: Supported deployment platforms and their static defaults.
// ABOUTME: The defaults table is read-only data fixed at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::manifest::StageKind;

/// Target platform family a deployment runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Kubernetes,
    Lambda,
    Terraform,
}

/// Per-platform constants.
#[derive(Debug)]
pub struct PlatformDefaults {
    /// Executable requested from the tool registry.
    pub tool: &'static str,
    /// How long an executor may take to stop after cancellation.
    pub grace_period: Duration,
    /// Stage kinds the platform executor implements.
    pub stages: &'static [StageKind],
}

static KUBERNETES: PlatformDefaults = PlatformDefaults {
    tool: "kubectl",
    grace_period: Duration::from_secs(30),
    stages: &[
        StageKind::Sync,
        StageKind::Apply,
        StageKind::Wait,
        StageKind::Rollback,
    ],
};

static LAMBDA: PlatformDefaults = PlatformDefaults {
    tool: "aws",
    grace_period: Duration::from_secs(15),
    stages: &[
        StageKind::Sync,
        StageKind::Apply,
        StageKind::Wait,
        StageKind::Rollback,
    ],
};

static TERRAFORM: PlatformDefaults = PlatformDefaults {
    tool: "terraform",
    grace_period: Duration::from_secs(60),
    stages: &[
        StageKind::Sync,
        StageKind::Plan,
        StageKind::Apply,
        StageKind::Wait,
        StageKind::Rollback,
    ],
};

impl Platform {
    pub fn defaults(self) -> &'static PlatformDefaults {
        match self {
            Platform::Kubernetes => &KUBERNETES,
            Platform::Lambda => &LAMBDA,
            Platform::Terraform => &TERRAFORM,
        }
    }

    pub fn supports(self, kind: StageKind) -> bool {
        self.defaults().stages.contains(&kind)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Kubernetes => write!(f, "kubernetes"),
            Platform::Lambda => write!(f, "lambda"),
            Platform::Terraform => write!(f, "terraform"),
        }
    }
}
