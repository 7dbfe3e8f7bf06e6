//! hub-builder CLI - incremental image builds for a hub of components
//!
//! Entry point for the hub-builder command-line application.

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use hub_builder::cli::output::display_error;
use hub_builder::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v/-q
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            display_error(&e);
            ExitCode::FAILURE
        }
    }
}
