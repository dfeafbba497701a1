//! GLOF CLI - Command-line interface
//!
//! One subcommand per pipeline stage, plus `run` to chain them.

mod cli;
mod commands;
mod config_loader;
mod dry_run;
mod errors;
mod layout;
mod output;
mod output_types;
mod progress;

use clap::Parser;
use cli::Cli;

fn main() {
    // Logs go to stderr so --json output on stdout stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json = cli.json;

    if let Err(error) = commands::execute(cli) {
        errors::report(error, json);
        std::process::exit(1);
    }
}
