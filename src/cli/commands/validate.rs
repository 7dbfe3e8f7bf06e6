//! Validate command implementation
//!
//! Implements `hub-builder validate <PATH>` to check a component manifest
//! without building anything.

use anyhow::{Context, Result};
use std::path::Path;
use std::process::ExitCode;

use crate::cli::output::status;
use crate::core::manifest::{HubManifestValidator, Manifest};
use crate::core::policy::ComponentPolicy;
use crate::core::settings::HubSettings;
use crate::core::target::TargetResolver;

/// Execute the validate command
pub fn execute(root: &Path, path: &Path) -> Result<ExitCode> {
    let settings = HubSettings::load(root).context("Failed to load hub-builder settings")?;
    let resolver = TargetResolver::new(root, &settings.discovery)?;
    let candidate = resolver.candidate(path);

    let manifest_path = candidate.path.join(&settings.discovery.manifest_file);
    let manifest = Manifest::load(&manifest_path)
        .with_context(|| format!("Failed to load manifest of {}", candidate.canonical_name))?;

    println!("Validating {}...\n", candidate.canonical_name);

    let validator = HubManifestValidator::new(&settings.validation);
    let issues = validator.issues(&candidate.canonical_name, &manifest);

    let policy = manifest.update_policy();
    if policy.parse::<ComponentPolicy>().is_err() {
        println!("{} Unknown update policy '{policy}', scheduled runs will skip it", status::WARNING);
    }

    if issues.is_empty() {
        println!("{} Manifest is valid", status::SUCCESS);
        return Ok(ExitCode::SUCCESS);
    }

    println!("{} Manifest has {} issue(s)", status::ERROR, issues.len());
    for issue in &issues {
        println!("  - {issue}");
    }
    Ok(ExitCode::FAILURE)
}
