//! Staleness engine
//!
//! Decides which discovered components must be rebuilt by comparing the
//! ledger's last successful build time against the latest modification of
//! the component directory and of the builder's own control files.

use std::path::{Path, PathBuf};

use crate::core::ledger::Ledger;
use crate::core::target::Candidate;
use crate::error::GitError;

/// Latest modification time of a path (Unix seconds)
pub trait ModificationTimeSource {
    /// `0` means "unknown"; an error is degraded to `0` by the engine
    fn modified_at(&self, path: &Path) -> Result<i64, GitError>;
}

/// Components selected for rebuilding
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaleSet {
    /// Stale components, in candidate order
    pub targets: Vec<Candidate>,
    /// Whether a builder control file change made any selected component stale
    pub builder_updated: bool,
    /// Latest modification across the builder control files
    pub builder_updated_at: i64,
}

impl StaleSet {
    /// Canonical names of the selected components
    pub fn names(&self) -> Vec<&str> {
        self.targets
            .iter()
            .map(|c| c.canonical_name.as_str())
            .collect()
    }

    /// Whether nothing needs building
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Computes stale components
pub struct StalenessEngine<'a> {
    times: &'a dyn ModificationTimeSource,
}

impl<'a> StalenessEngine<'a> {
    /// Create an engine reading modification times from `times`
    pub fn new(times: &'a dyn ModificationTimeSource) -> Self {
        Self { times }
    }

    fn lookup(&self, path: &Path) -> i64 {
        match self.times.modified_at(path) {
            Ok(at) => at,
            Err(e) => {
                tracing::warn!(path = %path.display(), "Modification time unknown, using 0: {e}");
                0
            }
        }
    }

    /// Latest modification across the builder's control files, `0` if none
    pub fn builder_updated_at(&self, builder_files: &[PathBuf]) -> i64 {
        builder_files
            .iter()
            .map(|f| self.lookup(f))
            .max()
            .unwrap_or(0)
    }

    /// Select the stale candidates
    ///
    /// A candidate is stale when it never built successfully, when its directory or
    /// any builder control file changed after its last successful build, or
    /// when `get_all` is set.
    pub fn compute_targets(
        &self,
        ledger: &Ledger,
        candidates: &[Candidate],
        builder_files: &[PathBuf],
        get_all: bool,
    ) -> StaleSet {
        let builder_updated_at = self.builder_updated_at(builder_files);
        let mut set = StaleSet {
            builder_updated_at,
            ..StaleSet::default()
        };

        for candidate in candidates {
            let name = candidate.canonical_name.as_str();
            let last = ledger.last_build_time(name);
            let modified = self.lookup(&candidate.path);
            let by_builder = builder_updated_at > last;
            let by_component = modified > last;
            let never_built = last == 0;

            let stale = get_all || never_built || by_builder || by_component;
            tracing::info!(
                component = name,
                last_build = last,
                modified,
                builder_updated_at,
                get_all,
                stale,
                "Staleness checked"
            );

            if stale {
                set.builder_updated |= by_builder;
                set.targets.push(candidate.clone());
            }
        }

        set
    }
}
