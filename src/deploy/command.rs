// ABOUTME: Commands the control plane sends into a running deployment.
// ABOUTME: Each is applied at most once; duplicates by id are dropped.

use serde::{Deserialize, Serialize};

use crate::types::CommandId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandKind {
    Cancel,
    Approve,
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalCommand {
    /// Deduplication key; commands without one are applied every time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CommandId>,
    #[serde(rename = "type")]
    pub kind: CommandKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_stage_index: Option<u32>,
}

impl ExternalCommand {
    pub fn cancel() -> Self {
        Self::new(CommandKind::Cancel, None)
    }

    pub fn approve(stage: u32) -> Self {
        Self::new(CommandKind::Approve, Some(stage))
    }

    pub fn skip(stage: u32) -> Self {
        Self::new(CommandKind::Skip, Some(stage))
    }

    pub fn new(kind: CommandKind, target_stage_index: Option<u32>) -> Self {
        Self {
            id: None,
            kind,
            target_stage_index,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(CommandId::new(id));
        self
    }
}
