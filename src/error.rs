//! Error types for hub-builder
//!
//! Domain-specific error types using thiserror.

use std::path::PathBuf;
use thiserror::Error;

/// Target discovery errors
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Hub subtree does not exist
    #[error("Hub directory not found: {path}")]
    HubDirNotFound { path: PathBuf },

    /// Glob pattern in settings is malformed
    #[error("Invalid glob pattern '{pattern}': {error}")]
    InvalidPattern { pattern: String, error: String },

    /// Two component directories map to the same ledger key
    #[error("Components '{first}' and '{second}' share the canonical name '{name}'")]
    NameCollision {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// Directory walk failed
    #[error("Failed to walk '{path}': {error}")]
    Walk { path: PathBuf, error: String },
}

/// A single invalid manifest field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    /// Field name (or `canonical_name` for the derived image name)
    pub field: String,
    /// Human-readable reason
    pub reason: String,
}

impl std::fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Manifest loading and validation errors
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Manifest file missing
    #[error("Manifest not found at '{path}'")]
    NotFound { path: PathBuf },

    /// Manifest file unreadable
    #[error("Failed to read manifest '{path}': {error}")]
    Read { path: PathBuf, error: String },

    /// Manifest is not a YAML mapping
    #[error("Failed to parse manifest '{path}': {error}")]
    Parse { path: PathBuf, error: String },

    /// One or more fields failed validation
    #[error("Manifest for '{component}' is invalid: {}", format_issues(issues))]
    Invalid {
        component: String,
        issues: Vec<FieldIssue>,
    },
}

fn format_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Update policy errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// Component declared a policy token outside the known set
    #[error("Unrecognized component update policy '{token}'")]
    UnknownComponentPolicy { token: String },

    /// Run was invoked with a strategy token outside the known set
    #[error("Unrecognized run update strategy '{token}'")]
    UnknownRunPolicy { token: String },
}

/// Image build errors
#[derive(Error, Debug)]
pub enum BuildError {
    /// Container engine not on PATH
    #[error("Container engine '{program}' not found in PATH")]
    RuntimeNotFound { program: String },

    /// Process could not be started
    #[error("Failed to start '{command}': {error}")]
    Spawn { command: String, error: String },

    /// Process exited unsuccessfully (code is None when killed by a signal)
    #[error("'{command}' failed with {}", describe_exit(*code))]
    CommandFailed { command: String, code: Option<i32> },

    /// Process exceeded its time budget and was killed
    #[error("'{command}' timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },

    /// `docker inspect` output was not usable
    #[error("Failed to inspect image '{image}': {error}")]
    Inspect { image: String, error: String },

    /// Manifest lacks something the build needs
    #[error("Cannot build '{component}': {message}")]
    Manifest { component: String, message: String },

    /// Filesystem preparation failed
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "termination by signal".to_string(),
    }
}

/// Ledger persistence errors
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Local ledger unreadable
    #[error("Failed to read ledger '{path}': {error}")]
    Read { path: PathBuf, error: String },

    /// Ledger document is not valid JSON of a known shape
    #[error("Failed to parse ledger from {source_name}: {error}")]
    Parse { source_name: String, error: String },

    /// Local ledger could not be replaced
    #[error("Failed to write ledger '{path}': {error}")]
    Write { path: PathBuf, error: String },

    /// Remote document store failed
    #[error("Remote ledger at '{url}' failed: {error}")]
    Remote { url: String, error: String },
}

/// Git lookup errors
#[derive(Error, Debug)]
pub enum GitError {
    /// `git` is not installed
    #[error("git executable not found in PATH")]
    NotInstalled,

    /// `git log` failed for a path
    #[error("git log failed for '{path}': {error}")]
    LogFailed { path: PathBuf, error: String },

    /// Repository could not be opened
    #[error("Invalid repository at '{path}': {error}")]
    InvalidRepository { path: PathBuf, error: String },
}

/// Status readme and badge errors
#[derive(Error, Debug)]
pub enum ReportError {
    /// Badge service unreachable or returned an error
    #[error("Failed to download badge from '{url}': {error}")]
    Download { url: String, error: String },

    /// Readme or badge file could not be written
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),
}

/// Settings file errors
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Failed to read settings file
    #[error("Failed to read settings file '{path}': {error}")]
    Read { path: PathBuf, error: String },

    /// Failed to parse settings file
    #[error("Failed to parse settings file '{path}': {error}")]
    Parse { path: PathBuf, error: String },
}

/// Filesystem errors
#[derive(Error, Debug)]
pub enum FilesystemError {
    /// Failed to create directory
    #[error("Failed to create directory '{path}': {error}")]
    CreateDir { path: PathBuf, error: String },

    /// Failed to write file
    #[error("Failed to write file '{path}': {error}")]
    WriteFile { path: PathBuf, error: String },

    /// Failed to read file
    #[error("Failed to read file '{path}': {error}")]
    ReadFile { path: PathBuf, error: String },

    /// Failed to copy a tree
    #[error("Failed to copy '{from}' to '{to}': {error}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        error: String,
    },
}

/// Top-level hub-builder error type
#[derive(Error, Debug)]
pub enum HubError {
    /// Discovery error
    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// Manifest error
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Policy error
    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    /// Build error
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// Ledger error
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Git error
    #[error("Git error: {0}")]
    Git(#[from] GitError),

    /// Report error
    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    /// Settings error
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    /// Filesystem error
    #[error("Filesystem error: {0}")]
    Filesystem(#[from] FilesystemError),
}
