//! Command implementations

mod config;
mod extract;
mod impute;
mod label;
mod run;
mod score;
mod train;

use crate::cli::{Cli, Commands};
use crate::output::OutputWriter;
use anyhow::Result;
use std::path::PathBuf;

/// State shared by every command
pub struct CommandContext {
    pub output: OutputWriter,
    pub dry_run: bool,
    pub config_path: Option<PathBuf>,
}

/// Execute a CLI command
pub fn execute(cli: Cli) -> Result<()> {
    let ctx = CommandContext {
        output: OutputWriter::new(cli.json),
        dry_run: cli.dry_run,
        config_path: cli.config,
    };

    match cli.command {
        Commands::Extract(args) => extract::execute(args, &ctx),
        Commands::Label(args) => label::execute(args, &ctx),
        Commands::Impute(args) => impute::execute(args, &ctx),
        Commands::Train(args) => train::execute(args, &ctx),
        Commands::Score(args) => score::execute(args, &ctx),
        Commands::Run(args) => run::execute(args, &ctx),
        Commands::Config => config::execute(&ctx),
    }
}

/// Fail with a pointer to the producing command when a stage input is absent
fn require_input(path: &std::path::Path, producer: &str) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(crate::errors::missing_stage_output(path, producer).into())
    }
}
