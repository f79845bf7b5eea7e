// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types to prevent ID confusion at compile time.

mod application_name;
mod artifact;
mod id;
mod image_ref;
mod trigger;

pub use application_name::{ApplicationName, ApplicationNameError};
pub use artifact::{ArtifactReference, StorageObject};
pub use id::{AgentId, CommandId, DeploymentId, Id};
pub use image_ref::{ImageRef, ParseImageRefError, find_image_tag};
pub use trigger::{RunningState, TriggerContext};
