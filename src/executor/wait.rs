// ABOUTME: WAIT stage shared by every platform.
// ABOUTME: Sleeps for the configured duration unless cancelled first.

use serde::Deserialize;
use std::time::Duration;

use super::error::ExecutorError;
use super::traits::{StageContext, StageResult};
use crate::deploy::StageInstance;

#[derive(Debug, Deserialize)]
struct WaitOptions {
    #[serde(with = "humantime_serde")]
    duration: Duration,
}

pub async fn wait(ctx: &StageContext, stage: &StageInstance) -> Result<StageResult, ExecutorError> {
    let options: WaitOptions = stage.options().parse().map_err(|e| {
        ExecutorError::configuration(format!("stage {}: invalid WAIT options: {e}", stage.index()))
    })?;

    tracing::info!(
        "stage {} waiting {}",
        stage.index(),
        humantime_serde::re::humantime::format_duration(options.duration)
    );

    tokio::select! {
        _ = tokio::time::sleep(options.duration) => Ok(StageResult::Success),
        _ = ctx.cancel.cancelled() => Err(ExecutorError::Cancelled),
    }
}
