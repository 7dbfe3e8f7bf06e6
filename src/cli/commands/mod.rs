//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod build;
pub mod status;
pub mod validate;

use anyhow::Result;
use clap::Subcommand;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::core::coordinator::RunInvocation;

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the components that changed since their last build
    Build {
        /// Build exactly this component directory, skipping change detection
        #[arg(short, long, value_name = "PATH")]
        target: Option<PathBuf>,

        /// Push the images after building
        #[arg(long, conflicts_with = "test")]
        push: bool,

        /// Smoke-test the images after building
        #[arg(long)]
        test: bool,

        /// Fail when there is nothing to build
        #[arg(long)]
        error_on_empty: bool,

        /// Reason recorded in the build history
        #[arg(long, num_args = 1.., value_name = "TEXT")]
        reason: Vec<String>,

        /// Only report whether anything would be built
        #[arg(long)]
        check_targets: bool,

        /// Reset the container runtime before each build
        #[arg(long)]
        bleach_first: bool,

        /// Run update strategy: force, manually, on-release, nightly or on-master
        #[arg(long, value_name = "TOKEN")]
        update_strategy: Option<String>,

        /// Remote build history endpoint
        #[arg(long, env = "HUB_BUILDER_LEDGER_URL", value_name = "URL")]
        ledger_url: Option<String>,

        /// Bearer token for the remote build history
        #[arg(long, env = "HUB_BUILDER_LEDGER_TOKEN", hide_env_values = true)]
        ledger_token: Option<String>,

        /// Use only the local build history file
        #[arg(long)]
        no_remote: bool,

        /// Do not refresh the status readme and badge
        #[arg(long)]
        no_report: bool,
    },

    /// Validate the manifest of one component
    Validate {
        /// Component directory
        path: PathBuf,
    },

    /// Show the build history
    Status {
        /// Remote build history endpoint
        #[arg(long, env = "HUB_BUILDER_LEDGER_URL", value_name = "URL")]
        ledger_url: Option<String>,

        /// Bearer token for the remote build history
        #[arg(long, env = "HUB_BUILDER_LEDGER_TOKEN", hide_env_values = true)]
        ledger_token: Option<String>,

        /// Use only the local build history file
        #[arg(long)]
        no_remote: bool,
    },
}

impl Commands {
    /// Execute the command against the repository at `root`
    pub async fn run(self, root: &Path) -> Result<ExitCode> {
        match self {
            Self::Build {
                target,
                push,
                test,
                error_on_empty,
                reason,
                check_targets,
                bleach_first,
                update_strategy,
                ledger_url,
                ledger_token,
                no_remote,
                no_report,
            } => {
                let reason = if reason.is_empty() {
                    None
                } else {
                    Some(reason.join(" "))
                };
                let options = build::BuildOptions {
                    invocation: RunInvocation {
                        target,
                        push,
                        test,
                        error_on_empty,
                        reason,
                        check_targets,
                        bleach_first,
                        update_strategy,
                    },
                    ledger_url,
                    ledger_token,
                    no_remote,
                    no_report,
                };
                build::execute(root, options).await
            }
            Self::Validate { path } => validate::execute(root, &path),
            Self::Status {
                ledger_url,
                ledger_token,
                no_remote,
            } => status::execute(root, ledger_url, ledger_token, no_remote).await,
        }
    }
}
