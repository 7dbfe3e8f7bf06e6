//! Repository settings
//!
//! Reads `hub-builder.toml` from the repository root. Every key is optional;
//! a missing file yields the defaults from [`crate::config::defaults`].
//! The resulting value is passed explicitly to the resolver, the stores and
//! the image builder.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::defaults;
use crate::error::SettingsError;

/// All settings for one repository
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HubSettings {
    /// Component discovery
    #[serde(default)]
    pub discovery: DiscoverySettings,

    /// Ledger persistence
    #[serde(default)]
    pub ledger: LedgerSettings,

    /// Status readme and badge
    #[serde(default)]
    pub report: ReportSettings,

    /// Image naming and build limits
    #[serde(default)]
    pub image: ImageSettings,

    /// Manifest allow-lists
    #[serde(default)]
    pub validation: ValidationSettings,
}

/// Component discovery settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiscoverySettings {
    /// Subtree holding the components, relative to the root
    pub hub_dir: String,
    /// Manifest file name inside a component
    pub manifest_file: String,
    /// Build recipe file name inside a component
    pub dockerfile: String,
    /// Root-relative globs of files that belong to components
    pub source_globs: Vec<String>,
    /// Root-relative globs excluded from discovery
    pub ignore_globs: Vec<String>,
    /// Root-relative globs of the builder's own control files
    pub builder_files: Vec<String>,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            hub_dir: defaults::HUB_DIR.to_string(),
            manifest_file: defaults::MANIFEST_FILE.to_string(),
            dockerfile: defaults::DOCKERFILE.to_string(),
            source_globs: to_strings(defaults::SOURCE_GLOBS),
            ignore_globs: to_strings(defaults::IGNORE_GLOBS),
            builder_files: to_strings(defaults::BUILDER_FILES),
        }
    }
}

/// Ledger persistence settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LedgerSettings {
    /// Local ledger file, relative to the root
    pub path: String,
    /// Remote JSON document endpoint
    pub remote_url: Option<String>,
    /// Write the remote document with a single run-level `LastBuildTime`
    pub scalar_last_build_time: bool,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            path: defaults::LEDGER_PATH.to_string(),
            remote_url: None,
            scalar_last_build_time: false,
        }
    }
}

/// Status report settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReportSettings {
    /// Readme carrying the badge section, relative to the root
    pub readme: String,
    /// Image-count badge file, relative to the root
    pub badge: String,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            readme: defaults::STATUS_README.to_string(),
            badge: defaults::HUB_BADGE.to_string(),
        }
    }
}

/// Image naming and build limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ImageSettings {
    /// Registry namespace, e.g. `jinaai/`
    pub registry: String,
    /// Dockerfile label prefix
    pub label_prefix: String,
    /// Commit URL prefix for the `source` label
    pub source_url_prefix: String,
    /// Timeout for `docker buildx build`
    pub build_timeout_secs: u64,
    /// Directory copied into each component before building, relative to the root
    pub vendor_source: Option<String>,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            registry: defaults::REGISTRY.to_string(),
            label_prefix: defaults::LABEL_PREFIX.to_string(),
            source_url_prefix: defaults::SOURCE_URL_PREFIX.to_string(),
            build_timeout_secs: defaults::BUILD_TIMEOUT_SECS,
            vendor_source: None,
        }
    }
}

/// Manifest allow-lists
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidationSettings {
    /// Accepted licence identifiers
    pub licenses: Vec<String>,
    /// Accepted build platforms
    pub platforms: Vec<String>,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            licenses: to_strings(defaults::APPROVED_LICENSES),
            platforms: to_strings(defaults::SUPPORTED_PLATFORMS),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl HubSettings {
    /// Load settings from `<root>/hub-builder.toml`
    pub fn load(root: &Path) -> Result<Self, SettingsError> {
        Self::load_from_path(&root.join(defaults::SETTINGS_FILE))
    }

    /// Load settings from a specific path
    ///
    /// A missing file yields the defaults; an unreadable or invalid file is an error.
    pub fn load_from_path(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| SettingsError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| SettingsError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Absolute path of the hub subtree
    pub fn hub_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.discovery.hub_dir)
    }

    /// Absolute path of the local ledger
    pub fn ledger_path(&self, root: &Path) -> PathBuf {
        root.join(&self.ledger.path)
    }

    /// Absolute path of the status readme
    pub fn readme_path(&self, root: &Path) -> PathBuf {
        root.join(&self.report.readme)
    }

    /// Absolute path of the image-count badge
    pub fn badge_path(&self, root: &Path) -> PathBuf {
        root.join(&self.report.badge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let settings = HubSettings::load(temp.path()).unwrap();
        assert_eq!(settings, HubSettings::default());
        assert_eq!(settings.discovery.hub_dir, "hub");
        assert_eq!(settings.ledger.path, "status/build-history.json");
        assert!(settings.ledger.remote_url.is_none());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("hub-builder.toml"),
            r#"
[ledger]
remote_url = "https://ledger.example.com/hub"

[image]
registry = "acme/"
build_timeout_secs = 60
"#,
        )
        .unwrap();

        let settings = HubSettings::load(temp.path()).unwrap();
        assert_eq!(
            settings.ledger.remote_url.as_deref(),
            Some("https://ledger.example.com/hub")
        );
        assert_eq!(settings.ledger.path, "status/build-history.json");
        assert_eq!(settings.image.registry, "acme/");
        assert_eq!(settings.image.build_timeout_secs, 60);
        assert_eq!(settings.image.label_prefix, "ai.jina.hub.");
        assert_eq!(settings.discovery, DiscoverySettings::default());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("hub-builder.toml"), "[ledger\npath = ").unwrap();

        let result = HubSettings::load(temp.path());
        assert!(matches!(result, Err(SettingsError::Parse { .. })));
    }

    #[test]
    fn test_paths_are_rooted() {
        let settings = HubSettings::default();
        let root = Path::new("/repo");
        assert_eq!(settings.hub_dir(root), PathBuf::from("/repo/hub"));
        assert_eq!(
            settings.ledger_path(root),
            PathBuf::from("/repo/status/build-history.json")
        );
        assert_eq!(settings.badge_path(root), PathBuf::from("/repo/status/hub-stat.svg"));
    }
}
