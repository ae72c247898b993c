mod cli;
mod commands;
mod config;
mod grading;
mod model;
mod store;
mod util;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::grading::GradingError;

fn main() {
    init_tracing();

    if let Err(err) = run() {
        let code = failure_code(&err);
        error!(error = %err, code, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => commands::init::run(&cli.store),
        Commands::ImportStandards(args) => commands::standards::run(&cli.store, args),
        Commands::RegisterSample(args) => commands::samples::run(&cli.store, args),
        Commands::Submit(args) => commands::submit::run(&cli.store, args),
        Commands::Recompute(args) => commands::recompute::run(&cli.store, args),
        Commands::Report(args) => commands::report::run(&cli.store, args),
        Commands::Status => commands::status::run(&cli.store),
    }
}

/// Stable code of the grading error behind a command failure, if any.
fn failure_code(err: &anyhow::Error) -> Option<&'static str> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<GradingError>())
        .map(GradingError::error_code)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
