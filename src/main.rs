//! Command-line host for vendoring remote scripts and stylesheets.

mod cli;
mod commands;
mod error;

use crate::cli::{Cli, Command};
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Command::Transform(args) => commands::transform(&cli, args).await,
        Command::Clean(args) => commands::clean(&cli, args).await,
        Command::Key(args) => commands::key(&cli, args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:?}");
            ExitCode::FAILURE
        },
    }
}
