//! Build coordinator
//!
//! Runs validate, build, test/push and ledger merge for each admitted
//! component, strictly one at a time. A failure is recorded against its
//! component and the batch moves on.

use serde_json::Value;
use std::path::PathBuf;

use crate::core::ledger::{BuildAttempt, Ledger};
use crate::core::manifest::{Manifest, ManifestValidator};
use crate::core::policy::{self, GateDecision, RunPolicy};
use crate::core::target::Candidate;
use crate::error::{BuildError, HubError};

/// Flags forwarded to the image builder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Push the image and its readme to the registry
    pub push: bool,
    /// Smoke-test the image after building
    pub test: bool,
}

/// Builds one component image
pub trait ImageBuilder {
    /// Build (and optionally test or push) an image, returning its inspection blob
    fn build(
        &self,
        target: &Candidate,
        manifest: &Manifest,
        options: &BuildOptions,
    ) -> Result<Value, BuildError>;
}

/// Resets the local build environment
pub trait BuildEnvironment {
    /// Best-effort cleanup before a build
    fn bleach(&self) -> Result<(), BuildError>;
}

/// Source of the current time
pub trait Clock {
    /// Current Unix time in seconds
    fn now(&self) -> i64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Flags governing one execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunInvocation {
    /// Explicit component directory; bypasses discovery, staleness and the gate
    pub target: Option<PathBuf>,
    /// Push after building
    pub push: bool,
    /// Smoke-test after building
    pub test: bool,
    /// Fail when the explicit target does not exist
    pub error_on_empty: bool,
    /// Reason recorded in the ledger instead of the generated one
    pub reason: Option<String>,
    /// Report what would be built and stop
    pub check_targets: bool,
    /// Reset the build environment before each build
    pub bleach_first: bool,
    /// Run-level policy token
    pub update_strategy: Option<String>,
}

impl RunInvocation {
    /// Whether every candidate is rebuilt regardless of timestamps
    pub fn get_all(&self) -> bool {
        self.update_strategy
            .as_deref()
            .and_then(|token| token.parse::<RunPolicy>().ok())
            .is_some_and(RunPolicy::rebuilds_all)
    }

    /// Options forwarded to the image builder
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            push: self.push,
            test: self.test,
        }
    }
}

/// What happened to one component
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Built (and tested/pushed as requested)
    Success,
    /// Attempted and failed
    Fail { error: String },
    /// Not attempted
    Skipped { reason: String },
}

/// Result for one component of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentReport {
    /// Canonical name
    pub name: String,
    /// Outcome
    pub outcome: Outcome,
    /// Build duration in seconds (0 when skipped)
    pub duration: i64,
}

impl ComponentReport {
    /// Whether the component was built successfully
    pub fn succeeded(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// Whether a build was attempted
    pub fn attempted(&self) -> bool {
        !matches!(self.outcome, Outcome::Skipped { .. })
    }
}

/// Aggregated results of a batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// One entry per candidate, in processing order
    pub components: Vec<ComponentReport>,
}

impl BatchReport {
    /// Number of successful builds
    pub fn succeeded(&self) -> usize {
        self.components.iter().filter(|c| c.succeeded()).count()
    }

    /// Number of attempted builds
    pub fn attempted(&self) -> usize {
        self.components.iter().filter(|c| c.attempted()).count()
    }

    /// Number of components skipped by the gate
    pub fn skipped(&self) -> usize {
        self.components.len() - self.attempted()
    }

    /// Whether builds were attempted and none succeeded
    pub fn all_failed(&self) -> bool {
        self.attempted() > 0 && self.succeeded() == 0
    }

    /// Canonical names of the attempted components
    pub fn attempted_names(&self) -> Vec<&str> {
        self.components
            .iter()
            .filter(|c| c.attempted())
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// Result of a check-only run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    /// This many components would be built
    WouldBuild(usize),
    /// Nothing is stale
    NothingToBuild,
}

/// Summarize the stale set without building
pub fn plan(targets: &[Candidate]) -> Plan {
    if targets.is_empty() {
        Plan::NothingToBuild
    } else {
        Plan::WouldBuild(targets.len())
    }
}

/// Candidates the update-policy gate admits for this invocation
///
/// A manifest that fails to load is kept; building it records the failure.
pub fn admitted(candidates: &[Candidate], invocation: &RunInvocation, manifest_file: &str) -> Vec<Candidate> {
    let Some(run) = invocation.update_strategy.as_deref() else {
        return candidates.to_vec();
    };
    candidates
        .iter()
        .filter(|candidate| match Manifest::load(&candidate.path.join(manifest_file)) {
            Ok(manifest) => gate(&candidate.canonical_name, &manifest.update_policy(), run).is_none(),
            Err(_) => true,
        })
        .cloned()
        .collect()
}

/// Sequences builds and merges their outcomes into the ledger
pub struct BuildCoordinator<'a> {
    validator: &'a dyn ManifestValidator,
    builder: &'a dyn ImageBuilder,
    environment: &'a dyn BuildEnvironment,
    clock: &'a dyn Clock,
    manifest_file: String,
}

impl<'a> BuildCoordinator<'a> {
    /// Compose a coordinator from its collaborators
    pub fn new(
        validator: &'a dyn ManifestValidator,
        builder: &'a dyn ImageBuilder,
        environment: &'a dyn BuildEnvironment,
        clock: &'a dyn Clock,
        manifest_file: impl Into<String>,
    ) -> Self {
        Self {
            validator,
            builder,
            environment,
            clock,
            manifest_file: manifest_file.into(),
        }
    }

    /// Build every admitted candidate in order
    pub fn run_batch(
        &self,
        candidates: &[Candidate],
        ledger: &mut Ledger,
        invocation: &RunInvocation,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        let total = candidates.len();

        for (index, candidate) in candidates.iter().enumerate() {
            tracing::info!(
                component = %candidate.canonical_name,
                "Image ({}/{total})",
                index + 1
            );
            report
                .components
                .push(self.process(candidate, ledger, invocation, true));
        }

        let succeeded = report.succeeded();
        let attempted = report.attempted();
        if succeeded == attempted {
            tracing::info!(succeeded, attempted, skipped = report.skipped(), "Batch finished");
        } else {
            tracing::warn!(succeeded, attempted, skipped = report.skipped(), "Batch finished with failures");
        }
        report
    }

    /// Build exactly one component, unconditionally
    pub fn run_single(
        &self,
        candidate: &Candidate,
        ledger: &mut Ledger,
        invocation: &RunInvocation,
    ) -> ComponentReport {
        self.process(candidate, ledger, invocation, false)
    }

    fn process(
        &self,
        candidate: &Candidate,
        ledger: &mut Ledger,
        invocation: &RunInvocation,
        gated: bool,
    ) -> ComponentReport {
        let name = candidate.canonical_name.as_str();
        let manifest = Manifest::load(&candidate.path.join(&self.manifest_file));

        if gated {
            if let (Some(run), Ok(manifest)) = (invocation.update_strategy.as_deref(), &manifest) {
                if let Some(reason) = gate(name, &manifest.update_policy(), run) {
                    return ComponentReport {
                        name: name.to_string(),
                        outcome: Outcome::Skipped { reason },
                        duration: 0,
                    };
                }
            }
        }

        ledger.mark_pending(name);

        if invocation.bleach_first {
            if let Err(e) = self.environment.bleach() {
                tracing::warn!(component = name, "Bleach failed, building anyway: {e}");
            }
        }

        let started_at = self.clock.now();
        let result = manifest
            .map_err(HubError::from)
            .and_then(|manifest| self.validate_and_build(candidate, &manifest, invocation));
        let finished_at = self.clock.now();
        let duration = (finished_at - started_at).max(0);

        let (success, inspect, outcome) = match result {
            Ok(inspect) => {
                tracing::info!(component = name, duration, "Successfully delivered image");
                (true, Some(inspect), Outcome::Success)
            }
            Err(e) => {
                tracing::error!(component = name, duration, "Build failed: {e}");
                (false, None, Outcome::Fail { error: e.to_string() })
            }
        };

        ledger.record_attempt(
            name,
            BuildAttempt {
                started_at,
                finished_at,
                success,
                inspect,
            },
        );

        ComponentReport {
            name: name.to_string(),
            outcome,
            duration,
        }
    }

    fn validate_and_build(
        &self,
        candidate: &Candidate,
        manifest: &Manifest,
        invocation: &RunInvocation,
    ) -> Result<Value, HubError> {
        self.validator
            .validate(&candidate.canonical_name, manifest)?;
        let inspect = self
            .builder
            .build(candidate, manifest, &invocation.build_options())?;
        Ok(inspect)
    }
}

/// Consult the gate; `Some(reason)` when the component is skipped
fn gate(name: &str, component_policy: &str, run_policy: &str) -> Option<String> {
    match policy::evaluate(component_policy, run_policy) {
        GateDecision::Admit => {
            tracing::info!(component = name, component_policy, run_policy, "Update policy admits build");
            None
        }
        GateDecision::Skip => {
            tracing::info!(component = name, component_policy, run_policy, "Update policy skips build");
            Some(format!(
                "update policy '{component_policy}' is not triggered by a '{run_policy}' run"
            ))
        }
        GateDecision::Invalid(e) => {
            tracing::warn!(component = name, component_policy, run_policy, "Skipping: {e}");
            Some(e.to_string())
        }
    }
}
