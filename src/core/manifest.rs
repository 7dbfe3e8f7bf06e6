//! Component manifest (manifest.yml) loading and validation
//!
//! A manifest is a flat YAML mapping describing one hub image. Loading strips
//! control characters from string values; validation reports every invalid
//! field in one pass so authors can fix them together.

use indexmap::IndexMap;
use regex::Regex;
use serde_yaml::Value;
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

use crate::config::defaults;
use crate::core::settings::ValidationSettings;
use crate::error::{FieldIssue, ManifestError};

/// Keys a manifest must declare
pub const REQUIRED_KEYS: &[&str] = &["name", "description"];

/// Keys a manifest may declare
pub const ALLOWED_KEYS: &[&str] = &[
    "name",
    "description",
    "author",
    "url",
    "documentation",
    "version",
    "vendor",
    "license",
    "avatar",
    "platform",
    "update",
];

/// Canonical names must look like `hub.<something>`
pub const IMAGE_NAME_PATTERN: &str = r"^hub.[a-zA-Z_$][a-zA-Z_\s\-\.$0-9]*$";

/// Human names: 3 to 21 characters, no dots
pub const NAME_PATTERN: &str = r"^[a-zA-Z_$][a-zA-Z_\s\-$0-9]{2,20}$";

/// Comparison operators allowed in front of a version, longest first
const VERSION_OPERATORS: &[&str] = &[
    ">=", "<=", "=>", "=<", "!=", "~>", "=", ">", "<", "~", "^",
];

fn image_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(IMAGE_NAME_PATTERN).expect("image name pattern is valid"))
}

fn name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(NAME_PATTERN).expect("name pattern is valid"))
}

/// A parsed component manifest
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    fields: IndexMap<String, Value>,
}

impl Manifest {
    /// Load and sanitize a manifest file
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        if !path.is_file() {
            return Err(ManifestError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path).map_err(|e| ManifestError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_yaml(&content, path)
    }

    /// Parse and sanitize manifest text; `origin` is only used in errors
    pub fn from_yaml(content: &str, origin: &Path) -> Result<Self, ManifestError> {
        let parse_error = |error: String| ManifestError::Parse {
            path: origin.to_path_buf(),
            error,
        };

        let value: Value = serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string()))?;
        let Value::Mapping(mapping) = value else {
            return Err(parse_error("expected a mapping of fields".to_string()));
        };

        let mut fields = IndexMap::new();
        for (key, mut value) in mapping {
            let Value::String(key) = key else {
                return Err(parse_error(format!("non-string key {key:?}")));
            };
            if sanitize(&mut value) {
                tracing::info!(field = %key, "Removed control characters from manifest value");
            }
            fields.insert(key, value);
        }

        Ok(Self { fields })
    }

    /// Raw value of a field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// String value of a field (numbers and booleans are not strings)
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Declared field names
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Set a field, replacing any previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// `name` field
    pub fn name(&self) -> Option<&str> {
        self.get_str("name")
    }

    /// `description` field
    pub fn description(&self) -> Option<&str> {
        self.get_str("description")
    }

    /// `version` field, rendered as text even when YAML parsed it as a number
    pub fn version(&self) -> Option<String> {
        self.get("version").and_then(scalar_text)
    }

    /// `license` field
    pub fn license(&self) -> Option<&str> {
        self.get_str("license")
    }

    /// Declared build platforms (a single string counts as one platform)
    pub fn platforms(&self) -> Vec<String> {
        match self.get("platform") {
            Some(Value::Sequence(items)) => items.iter().filter_map(scalar_text).collect(),
            Some(Value::String(single)) => vec![single.clone()],
            _ => Vec::new(),
        }
    }

    /// Declared update policy token, `nightly` when absent
    pub fn update_policy(&self) -> String {
        self.get("update")
            .and_then(scalar_text)
            .unwrap_or_else(|| defaults::DEFAULT_UPDATE_POLICY.to_string())
    }

    /// Fields rendered as `(key, text)` pairs for image labels
    pub fn labels(&self) -> Vec<(String, String)> {
        self.fields
            .iter()
            .map(|(key, value)| {
                let text = match value {
                    Value::Sequence(items) => items
                        .iter()
                        .filter_map(scalar_text)
                        .collect::<Vec<_>>()
                        .join(","),
                    other => scalar_text(other).unwrap_or_default(),
                };
                (key.clone(), text)
            })
            .collect()
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Control, format and private-use characters (Unicode categories Cc, Cf, Co)
fn is_other_category(c: char) -> bool {
    c.is_control()
        || matches!(
            c,
            '\u{00AD}'
                | '\u{0600}'..='\u{0605}'
                | '\u{061C}'
                | '\u{06DD}'
                | '\u{070F}'
                | '\u{0890}'..='\u{0891}'
                | '\u{08E2}'
                | '\u{180E}'
                | '\u{200B}'..='\u{200F}'
                | '\u{202A}'..='\u{202E}'
                | '\u{2060}'..='\u{2064}'
                | '\u{2066}'..='\u{206F}'
                | '\u{FEFF}'
                | '\u{FFF9}'..='\u{FFFB}'
                | '\u{110BD}'
                | '\u{110CD}'
                | '\u{13430}'..='\u{1343F}'
                | '\u{1BCA0}'..='\u{1BCA3}'
                | '\u{1D173}'..='\u{1D17A}'
                | '\u{E0001}'
                | '\u{E0020}'..='\u{E007F}'
                | '\u{E000}'..='\u{F8FF}'
                | '\u{F0000}'..='\u{FFFFD}'
                | '\u{100000}'..='\u{10FFFD}'
        )
}

/// Strip control characters from every string inside `value`; true if anything changed
fn sanitize(value: &mut Value) -> bool {
    match value {
        Value::String(text) => {
            let cleaned: String = text.chars().filter(|&c| !is_other_category(c)).collect();
            if cleaned == *text {
                false
            } else {
                *text = cleaned;
                true
            }
        }
        Value::Sequence(items) => items.iter_mut().fold(false, |changed, item| sanitize(item) | changed),
        _ => false,
    }
}

/// Checks a manifest before it is built
pub trait ManifestValidator {
    /// Pass, or fail with every invalid field
    fn validate(&self, canonical_name: &str, manifest: &Manifest) -> Result<(), ManifestError>;
}

/// Schema, naming, version, licence and platform rules for hub images
#[derive(Debug, Clone)]
pub struct HubManifestValidator {
    licenses: HashSet<String>,
    platforms: HashSet<String>,
}

impl HubManifestValidator {
    /// Create a validator from the allow-lists in settings
    pub fn new(settings: &ValidationSettings) -> Self {
        Self {
            licenses: settings.licenses.iter().cloned().collect(),
            platforms: settings.platforms.iter().cloned().collect(),
        }
    }

    /// Every problem found in a manifest
    pub fn issues(&self, canonical_name: &str, manifest: &Manifest) -> Vec<FieldIssue> {
        let mut issues = Vec::new();
        let mut issue = |field: &str, reason: String| {
            issues.push(FieldIssue {
                field: field.to_string(),
                reason,
            });
        };

        for key in REQUIRED_KEYS {
            if manifest.get(key).is_none() {
                issue(key, "required field is missing".to_string());
            }
        }
        for key in manifest.keys() {
            if !ALLOWED_KEYS.contains(&key) {
                issue(key, "field is not allowed".to_string());
            }
        }

        if !image_name_regex().is_match(canonical_name) {
            issue(
                "canonical_name",
                format!("'{canonical_name}' does not match {IMAGE_NAME_PATTERN}"),
            );
        }

        if let Some(value) = manifest.get("name") {
            match value.as_str() {
                Some(name) if name_regex().is_match(name) => {}
                Some(name) => issue("name", format!("'{name}' does not match {NAME_PATTERN}")),
                None => issue("name", "must be a string".to_string()),
            }
        }

        match manifest.version() {
            Some(version) if is_semantic_version(&version) => {}
            Some(version) => issue(
                "version",
                format!("'{version}' is not a semantic version number"),
            ),
            None => issue("version", "required for tagging the image".to_string()),
        }

        match manifest.license() {
            Some(license) if self.licenses.contains(license) => {}
            Some(license) => issue("license", format!("'{license}' is not an approved licence")),
            None => issue("license", "an approved licence is required".to_string()),
        }

        for platform in manifest.platforms() {
            if !self.platforms.contains(&platform) {
                issue("platform", format!("'{platform}' is not a supported platform"));
            }
        }

        issues
    }
}

impl Default for HubManifestValidator {
    fn default() -> Self {
        Self::new(&ValidationSettings::default())
    }
}

impl ManifestValidator for HubManifestValidator {
    fn validate(&self, canonical_name: &str, manifest: &Manifest) -> Result<(), ManifestError> {
        let issues = self.issues(canonical_name, manifest);
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ManifestError::Invalid {
                component: canonical_name.to_string(),
                issues,
            })
        }
    }
}

/// `1.2.3`, `1.2.3-rc.1+build.5`, optionally behind one comparison operator
pub fn is_semantic_version(text: &str) -> bool {
    let bare = VERSION_OPERATORS
        .iter()
        .find_map(|op| text.strip_prefix(op))
        .unwrap_or(text);
    semver::Version::parse(bare).is_ok()
}
