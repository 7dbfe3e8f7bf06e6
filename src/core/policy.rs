//! Update-policy gate
//!
//! Components declare how eagerly they want to be rebuilt (`update:` in the
//! manifest); each run carries the urgency of the event that triggered it.
//! Both are mapped onto one numeric scale and compared.
//!
//! A run admits a component when the run's level is at or below the
//! component's level. A `nightly` run rebuilds `nightly` and `on-master`
//! components, an `on-master` run only rebuilds `on-master` components, and
//! `never` components are rebuilt by `force` runs alone.

use std::fmt;
use std::str::FromStr;

use crate::error::PolicyError;

/// Urgency of the event that triggered a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RunPolicy {
    /// Rebuild regardless of declared policy
    Force,
    /// Triggered by hand
    Manually,
    /// Triggered by a release
    OnRelease,
    /// Scheduled nightly run
    Nightly,
    /// Triggered by a push to master
    OnMaster,
}

impl RunPolicy {
    /// All run policies, lowest level first
    pub const ALL: [Self; 5] = [
        Self::Force,
        Self::Manually,
        Self::OnRelease,
        Self::Nightly,
        Self::OnMaster,
    ];

    /// Position on the shared urgency scale
    pub fn level(self) -> u8 {
        match self {
            Self::Force => 0,
            Self::Manually => 20,
            Self::OnRelease => 30,
            Self::Nightly => 40,
            Self::OnMaster => 50,
        }
    }

    /// Manifest and CLI token
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Force => "force",
            Self::Manually => "manually",
            Self::OnRelease => "on-release",
            Self::Nightly => "nightly",
            Self::OnMaster => "on-master",
        }
    }

    /// Whether this run rebuilds every candidate regardless of timestamps
    pub fn rebuilds_all(self) -> bool {
        self == Self::OnRelease
    }
}

impl FromStr for RunPolicy {
    type Err = PolicyError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == token)
            .ok_or_else(|| PolicyError::UnknownRunPolicy {
                token: token.to_string(),
            })
    }
}

impl fmt::Display for RunPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rebuild policy a component declares in its manifest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComponentPolicy {
    /// Only forced runs rebuild it
    Never,
    /// Rebuilt by manual runs and below
    Manually,
    /// Rebuilt by release runs and below
    OnRelease,
    /// Rebuilt by nightly runs and below
    #[default]
    Nightly,
    /// Rebuilt by every run
    OnMaster,
}

impl ComponentPolicy {
    /// All component policies, lowest level first
    pub const ALL: [Self; 5] = [
        Self::Never,
        Self::Manually,
        Self::OnRelease,
        Self::Nightly,
        Self::OnMaster,
    ];

    /// Position on the shared urgency scale
    pub fn level(self) -> u8 {
        match self {
            Self::Never => 10,
            Self::Manually => 20,
            Self::OnRelease => 30,
            Self::Nightly => 40,
            Self::OnMaster => 50,
        }
    }

    /// Manifest token
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Never => "never",
            Self::Manually => "manually",
            Self::OnRelease => "on-release",
            Self::Nightly => "nightly",
            Self::OnMaster => "on-master",
        }
    }
}

impl FromStr for ComponentPolicy {
    type Err = PolicyError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == token)
            .ok_or_else(|| PolicyError::UnknownComponentPolicy {
                token: token.to_string(),
            })
    }
}

impl fmt::Display for ComponentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the gate for one component
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Build it
    Admit,
    /// Policy levels do not allow it
    Skip,
    /// One of the tokens is not recognized
    Invalid(PolicyError),
}

impl GateDecision {
    /// Whether the component should be built
    pub fn admitted(&self) -> bool {
        matches!(self, Self::Admit)
    }
}

/// Compare parsed policies
pub fn decide(component: ComponentPolicy, run: RunPolicy) -> bool {
    run.level() <= component.level()
}

/// Evaluate the gate on raw tokens
pub fn evaluate(component: &str, run: &str) -> GateDecision {
    let component_policy = match component.parse::<ComponentPolicy>() {
        Ok(policy) => policy,
        Err(e) => return GateDecision::Invalid(e),
    };
    let run_policy = match run.parse::<RunPolicy>() {
        Ok(policy) => policy,
        Err(e) => return GateDecision::Invalid(e),
    };

    if decide(component_policy, run_policy) {
        GateDecision::Admit
    } else {
        GateDecision::Skip
    }
}

/// Admit or skip a component; unrecognized tokens skip
pub fn admit(component: &str, run: &str) -> bool {
    match evaluate(component, run) {
        GateDecision::Admit => true,
        GateDecision::Skip => false,
        GateDecision::Invalid(e) => {
            tracing::warn!(component_policy = component, run_policy = run, "{e}");
            false
        }
    }
}
