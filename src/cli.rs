// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stagehand")]
#[command(about = "Deployment pipeline engine for Kubernetes, Lambda, and Terraform")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print the final result
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new stagehand.yml agent configuration
    Init {
        /// Agent identifier (defaults to the hostname)
        #[arg(long)]
        agent_id: Option<String>,

        /// Control plane address (host:port)
        #[arg(long)]
        control_plane: Option<String>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Run one deployment of a manifest to completion
    Run {
        /// Deployment manifest
        manifest: PathBuf,

        /// Commit that triggered the deployment
        #[arg(short, long, default_value = "")]
        commit: String,

        /// Deployment id (generated when omitted)
        #[arg(long)]
        id: Option<String>,

        /// Paths changed by the commit; the run is skipped if none is relevant
        #[arg(long = "changed")]
        changed: Vec<PathBuf>,

        /// Commit currently deployed, for rollback
        #[arg(long)]
        running_commit: Option<String>,

        /// Image currently deployed, for rollback
        #[arg(long)]
        running_image: Option<String>,

        /// Checkout of the running commit's application directory, for rollback
        #[arg(long)]
        running_source: Option<PathBuf>,

        /// Agent configuration file (discovered in the current directory otherwise)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the revision name a manifest and commit resolve to
    Revision {
        /// Deployment manifest
        manifest: PathBuf,

        /// Commit hash
        #[arg(short, long, default_value = "")]
        commit: String,
    },

    /// Print the tag of an image reference
    Tag {
        /// Image reference, e.g. registry/app:1.2.3
        reference: String,
    },
}
