// ABOUTME: Command module aggregator for the stagehand CLI.
// ABOUTME: Re-exports run and revision command handlers.

mod revision;
mod run;

pub use revision::{print_revision, print_tag};
pub use run::{RunArgs, run_deployment};
