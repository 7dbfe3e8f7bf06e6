//! Command-line interface module
//!
//! This module handles argument parsing and output formatting.
//! It contains no business logic - that belongs in the [`crate::core`] module.

pub mod commands;
pub mod output;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use commands::Commands;

/// Hub builder - incremental image builds for a hub of containerized components
///
/// Finds the components changed since their last build, builds and pushes
/// their images, and keeps the build history and status pages up to date.
#[derive(Parser, Debug)]
#[command(name = "hub-builder")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Repository root (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Log filter directive for the chosen verbosity
    pub fn log_directive(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }

    /// Execute the CLI command
    pub async fn run(self) -> Result<ExitCode> {
        let root = match self.root {
            Some(root) => root,
            None => std::env::current_dir().context("Failed to read current directory")?,
        };

        if let Some(cmd) = self.command {
            cmd.run(&root).await
        } else {
            use clap::CommandFactory;
            let mut cmd = Self::command();
            cmd.print_help()?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
