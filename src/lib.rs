// ABOUTME: Library root for stagehand - the deployment pipeline execution engine.
// ABOUTME: The CLI binary is in main.rs and only wires these modules together.

pub mod config;
pub mod deploy;
pub mod diagnostics;
pub mod error;
pub mod executor;
pub mod output;
pub mod plan;
pub mod report;
pub mod revision;
pub mod types;
