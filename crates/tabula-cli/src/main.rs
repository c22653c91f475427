//! Tabula CLI - manage datasets and search the catalog.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let default = if verbose { "tabula=debug,info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // A second init (e.g. in tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Init {
            path,
            title,
            private,
        } => commands::init::run(path, title, private, cli.verbose),

        Commands::Info { path, json } => commands::info::run(path, json, cli.verbose),

        Commands::Index { root, channels } => commands::index::run(root, channels, cli.verbose),

        Commands::Reindex {
            root,
            include,
            channels,
        } => commands::reindex::run(root, include, channels, cli.verbose),

        Commands::Find {
            source,
            filters,
            mode,
            case_sensitive,
            threshold,
            json,
        } => commands::find::run(
            source,
            filters,
            mode,
            case_sensitive,
            threshold,
            json,
            cli.verbose,
        ),

        Commands::Show {
            path,
            source,
            rows,
            json,
        } => commands::show::run(path, source, rows, json, cli.verbose),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
