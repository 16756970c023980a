//! sddkit - spec-driven development scaffolding
//!
//! Command line entry point; all logic lives in the library crate.

use clap::Parser;

use sddkit::cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Fetch(args) => sddkit::commands::fetch::run(cli.project_dir, args, cli.verbose),
        Commands::Cache(args) => sddkit::commands::cache::run(args),
        Commands::Version => sddkit::commands::version::run(),
        Commands::Completions(args) => sddkit::commands::completions::run(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
