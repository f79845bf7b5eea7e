// ABOUTME: Entry point for the stagehand CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use commands::RunArgs;
use stagehand::config;
use stagehand::error::Result;
use stagehand::output::{Output, OutputMode};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbose flag
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };
    let output = Output::new(mode);

    if let Err(e) = run(cli.command, output.clone()).await {
        output.error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(command: Commands, output: Output) -> Result<()> {
    match command {
        Commands::Init {
            agent_id,
            control_plane,
            force,
        } => {
            let cwd = env::current_dir()?;
            config::init_config(&cwd, agent_id.as_deref(), control_plane.as_deref(), force)?;
            output.success(&format!("Created {}", config::CONFIG_FILENAME));
            Ok(())
        }
        Commands::Run {
            manifest,
            commit,
            id,
            changed,
            running_commit,
            running_image,
            running_source,
            config,
        } => {
            let args = RunArgs {
                manifest,
                commit,
                id,
                changed,
                running_commit,
                running_image,
                running_source,
                config,
            };
            commands::run_deployment(args, output).await
        }
        Commands::Revision { manifest, commit } => {
            commands::print_revision(&manifest, &commit, &output)
        }
        Commands::Tag { reference } => commands::print_tag(&reference, &output),
    }
}
