use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "archetype",
    about = "Resolve archetype choice flows and generate projects",
    version
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags accepted by every subcommand.
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Increase logging verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Values supplied from outside the flow.
#[derive(Debug, Args)]
pub struct InputArgs {
    /// Set an input value by absolute path (can be repeated: -i path=value)
    #[arg(short, long = "input", value_name = "PATH=VALUE")]
    pub inputs: Vec<String>,

    /// Replay the choices file written by a previous generation
    #[arg(long, value_name = "FILE")]
    pub choices: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a project from an archetype
    Generate {
        /// Archetype directory (holds archetype.toml and the root descriptor)
        archetype: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        inputs: InputArgs,

        /// Never prompt; every value must come from inputs, presets or defaults
        #[arg(long)]
        batch: bool,

        /// Show the files that would be generated without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Overwrite output directory if it exists
        #[arg(long)]
        overwrite: bool,
    },

    /// Validate an archetype directory
    Check {
        /// Path to the archetype to check (default: current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Resolve in batch mode and print the selected files and merged model as JSON
    Outputs {
        /// Archetype directory
        archetype: PathBuf,

        #[command(flatten)]
        inputs: InputArgs,
    },
}
