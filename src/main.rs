mod cli;
mod commands;
mod logging;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(&cli.global);

    match cli.command {
        Commands::Generate {
            archetype,
            output,
            inputs,
            batch,
            dry_run,
            overwrite,
        } => commands::generate::run(archetype, output, inputs, batch, dry_run, overwrite),
        Commands::Check { path } => commands::check::run(path),
        Commands::Outputs { archetype, inputs } => commands::outputs::run(archetype, inputs),
    }
}
