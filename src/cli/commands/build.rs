//! Build command implementation
//!
//! Implements `hub-builder build`: pick the components to build, build them
//! one after another, then persist the build history and refresh the status
//! readme and badge.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::path::Path;
use std::process::ExitCode;

use crate::cli::output::{self, status};
use crate::core::coordinator::{admitted, plan, BuildCoordinator, Plan, RunInvocation, SystemClock};
use crate::core::ledger::Ledger;
use crate::core::manifest::HubManifestValidator;
use crate::core::report;
use crate::core::settings::HubSettings;
use crate::core::staleness::StalenessEngine;
use crate::core::target::TargetResolver;
use crate::infra::badge;
use crate::infra::docker::{DockerEnvironment, DockerImageBuilder};
use crate::infra::git::{self, GitTimestampSource};
use crate::infra::ledger_store::LedgerPersistence;

/// Build options
pub struct BuildOptions {
    /// What to build and how
    pub invocation: RunInvocation,
    /// Remote build history endpoint
    pub ledger_url: Option<String>,
    /// Bearer token for the remote build history
    pub ledger_token: Option<String>,
    /// Skip the remote build history
    pub no_remote: bool,
    /// Skip the status readme and badge
    pub no_report: bool,
}

/// Execute the build command
pub async fn execute(root: &Path, options: BuildOptions) -> Result<ExitCode> {
    let settings = HubSettings::load(root).context("Failed to load hub-builder settings")?;
    let resolver = TargetResolver::new(root, &settings.discovery)?;

    let mut persistence = LedgerPersistence::from_settings(
        root,
        &settings,
        options.ledger_url.clone(),
        options.ledger_token.clone(),
    );
    if options.no_remote {
        persistence = persistence.without_remote();
    }

    match options.invocation.target.clone() {
        Some(target) => build_single(root, &settings, &resolver, &persistence, &options, &target).await,
        None => build_batch(root, &settings, &resolver, &persistence, &options).await,
    }
}

async fn build_single(
    root: &Path,
    settings: &HubSettings,
    resolver: &TargetResolver,
    persistence: &LedgerPersistence,
    options: &BuildOptions,
    target: &Path,
) -> Result<ExitCode> {
    let invocation = &options.invocation;
    let candidate = resolver.candidate(target);

    if !candidate.path.is_dir() {
        if invocation.error_on_empty {
            bail!("Target {} does not exist", candidate.path.display());
        }
        println!("{} Nothing to build: {} does not exist", status::INFO, candidate.path.display());
        return Ok(ExitCode::SUCCESS);
    }

    if invocation.check_targets {
        println!("{} Would build 1 image: {}", status::INFO, candidate.canonical_name);
        return Ok(ExitCode::SUCCESS);
    }

    let mut ledger = persistence.load().await;
    let revision = git::builder_revision(root);

    let validator = HubManifestValidator::new(&settings.validation);
    let builder = DockerImageBuilder::new(root, settings, revision.clone())?;
    let environment = DockerEnvironment::new()?;
    let clock = SystemClock;
    let coordinator = BuildCoordinator::new(
        &validator,
        &builder,
        &environment,
        &clock,
        settings.discovery.manifest_file.clone(),
    );

    let result = tokio::task::block_in_place(|| coordinator.run_single(&candidate, &mut ledger, invocation));
    println!("{}", output::component_line(&result));

    let reason = invocation
        .reason
        .clone()
        .unwrap_or_else(|| report::build_reason(&[candidate.canonical_name.as_str()], false));
    finish(root, settings, persistence, &mut ledger, reason, revision, options.no_report).await;

    Ok(if result.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn build_batch(
    root: &Path,
    settings: &HubSettings,
    resolver: &TargetResolver,
    persistence: &LedgerPersistence,
    options: &BuildOptions,
) -> Result<ExitCode> {
    let invocation = &options.invocation;
    let candidates = resolver.discover()?;

    let mut ledger = persistence.load().await;

    let times = GitTimestampSource::new(root);
    let stale = StalenessEngine::new(&times).compute_targets(
        &ledger,
        &candidates,
        &resolver.builder_files(),
        invocation.get_all(),
    );

    if invocation.check_targets {
        let targets = admitted(&stale.targets, invocation, &settings.discovery.manifest_file);
        return Ok(match plan(&targets) {
            Plan::WouldBuild(count) => {
                let names: Vec<&str> = targets.iter().map(|c| c.canonical_name.as_str()).collect();
                println!("{} Would build {count} image(s): {}", status::INFO, names.join(", "));
                ExitCode::SUCCESS
            }
            Plan::NothingToBuild => {
                println!("{} Nothing to build", status::INFO);
                ExitCode::FAILURE
            }
        });
    }

    if stale.is_empty() {
        if invocation.error_on_empty {
            bail!("Nothing to build");
        }
        println!("{} Nothing to build", status::INFO);
        return Ok(ExitCode::SUCCESS);
    }

    let revision = git::builder_revision(root);
    let validator = HubManifestValidator::new(&settings.validation);
    let builder = DockerImageBuilder::new(root, settings, revision.clone())?;
    let environment = DockerEnvironment::new()?;
    let clock = SystemClock;
    let coordinator = BuildCoordinator::new(
        &validator,
        &builder,
        &environment,
        &clock,
        settings.discovery.manifest_file.clone(),
    );

    let batch = tokio::task::block_in_place(|| coordinator.run_batch(&stale.targets, &mut ledger, invocation));
    for component in &batch.components {
        println!("{}", output::component_line(component));
    }
    println!("{}", output::batch_summary(&batch));

    if batch.attempted() == 0 {
        return Ok(ExitCode::SUCCESS);
    }

    let reason = invocation
        .reason
        .clone()
        .unwrap_or_else(|| report::build_reason(&stale.names(), stale.builder_updated));
    finish(root, settings, persistence, &mut ledger, reason, revision, options.no_report).await;

    Ok(if batch.all_failed() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Record the run and publish the history; every step is best effort
async fn finish(
    root: &Path,
    settings: &HubSettings,
    persistence: &LedgerPersistence,
    ledger: &mut Ledger,
    reason: String,
    revision: String,
    no_report: bool,
) {
    ledger.stamp(reason, revision.clone());

    let saved = persistence.save(ledger, &revision).await;
    if !saved.is_complete() {
        println!("{} Build history was not written everywhere, see the log", status::WARNING);
    }

    if no_report {
        return;
    }

    if let Err(e) = badge::update_status_readme(&settings.readme_path(root), ledger, Utc::now()) {
        tracing::warn!("Can't update status readme: {e}");
    }

    let client = badge::badge_client();
    if let Err(e) = badge::update_hub_badge(&client, ledger, &settings.badge_path(root)).await {
        tracing::warn!("Can't update hub badge: {e}");
    }
}
