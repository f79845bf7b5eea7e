// ABOUTME: Custom serde deserializers for manifest and agent config types.
// ABOUTME: Handles application names, pipeline stage lists, and control-plane addresses.

use serde::Deserialize;
use std::time::Duration;

use super::manifest::StageSpec;
use crate::types::ApplicationName;

pub fn deserialize_application_name<'de, D>(deserializer: D) -> Result<ApplicationName, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    ApplicationName::new(&s).map_err(serde::de::Error::custom)
}

/// `pipeline: {stages: [...]}` with stage indices assigned from list order.
///
/// An explicit empty stage list is kept as `Some(vec![])` so the plan builder
/// can reject it; only an absent pipeline means quick sync.
pub fn deserialize_pipeline<'de, D>(deserializer: D) -> Result<Option<Vec<StageSpec>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<PipelineEntry> = Option::deserialize(deserializer)?;
    Ok(opt.map(|entry| {
        entry
            .stages
            .into_iter()
            .enumerate()
            .map(|(i, mut stage)| {
                stage.index = u32::try_from(i).unwrap_or(u32::MAX);
                stage
            })
            .collect()
    }))
}

/// `host:port`, with the port required.
pub fn deserialize_address<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    let valid = s
        .rsplit_once(':')
        .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
    if valid {
        Ok(s)
    } else {
        Err(serde::de::Error::custom(format!(
            "control plane address must be host:port, got {s:?}"
        )))
    }
}

/// Humantime duration that must be greater than zero.
pub fn deserialize_nonzero_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let duration: Duration = humantime_serde::deserialize(deserializer)?;
    if duration.is_zero() {
        return Err(serde::de::Error::custom("duration must be greater than zero"));
    }
    Ok(duration)
}

#[derive(Debug, Deserialize)]
struct PipelineEntry {
    #[serde(default)]
    stages: Vec<StageSpec>,
}
