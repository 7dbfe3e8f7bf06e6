//! Status command implementation
//!
//! Implements `hub-builder status` to print the build history.

use anyhow::{Context, Result};
use std::path::Path;
use std::process::ExitCode;

use crate::cli::output::{format_timestamp, status};
use crate::core::ledger::BuildStatus;
use crate::core::settings::HubSettings;
use crate::infra::ledger_store::LedgerPersistence;

/// Execute the status command
pub async fn execute(
    root: &Path,
    ledger_url: Option<String>,
    ledger_token: Option<String>,
    no_remote: bool,
) -> Result<ExitCode> {
    let settings = HubSettings::load(root).context("Failed to load hub-builder settings")?;
    let mut persistence = LedgerPersistence::from_settings(root, &settings, ledger_url, ledger_token);
    if no_remote {
        persistence = persistence.without_remote();
    }
    let ledger = persistence.load().await;

    if ledger.last_build_status.is_empty() {
        println!("{} No builds recorded", status::INFO);
        return Ok(ExitCode::SUCCESS);
    }

    println!("Build history ({} images):\n", ledger.last_build_status.len());
    for (name, build_status) in &ledger.last_build_status {
        let prefix = match build_status {
            BuildStatus::Success => status::SUCCESS,
            BuildStatus::Fail => status::ERROR,
            BuildStatus::Pending => status::WARNING,
        };
        let attempts = ledger.images.get(name).map_or(0, |record| record.build_log.len());
        println!(
            "{prefix} {name:<40} {:<8} last built {} ({attempts} attempts)",
            build_status.as_str(),
            format_timestamp(ledger.last_build_time(name))
        );
    }

    if !ledger.last_build_reason.is_empty() {
        println!("\nLast run: {}", ledger.last_build_reason);
    }
    if let Some(revision) = &ledger.builder_revision {
        println!("Builder revision: {revision}");
    }
    Ok(ExitCode::SUCCESS)
}
