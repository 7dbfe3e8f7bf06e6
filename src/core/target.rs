//! Component discovery
//!
//! Walks the hub subtree, keeps files matching the source globs and not the
//! ignore globs, and reduces each one to the component directory that owns it
//! (the nearest ancestor holding a manifest). Each component is keyed in the
//! ledger by its canonical name.

use glob::{MatchOptions, Pattern};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::core::settings::DiscoverySettings;
use crate::error::ResolveError;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A component directory that may need building
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Candidate {
    /// Component directory
    pub path: PathBuf,
    /// Dotted ledger key derived from `path`
    pub canonical_name: String,
}

impl Candidate {
    /// Build a candidate for a directory under `root`
    pub fn new(root: &Path, path: PathBuf) -> Self {
        let canonical_name = canonical_name(root, &path);
        Self {
            path,
            canonical_name,
        }
    }
}

/// Derive the ledger key of a directory
///
/// Strips the `root` prefix, joins the remaining components with `.` and drops
/// leading dots. `root/hub/encoders/foo` becomes `hub.encoders.foo`; `root`
/// itself becomes the empty string.
pub fn canonical_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let joined = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => None,
        })
        .collect::<Vec<_>>()
        .join(".");
    joined.trim_start_matches('.').to_string()
}

/// Root-relative path with `/` separators, as matched by the globs
fn relative_slash_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn compile(patterns: &[String]) -> Result<Vec<Pattern>, ResolveError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|e| ResolveError::InvalidPattern {
                pattern: pattern.clone(),
                error: e.to_string(),
            })
        })
        .collect()
}

/// Finds the components of a repository
#[derive(Debug)]
pub struct TargetResolver {
    root: PathBuf,
    hub_dir: PathBuf,
    manifest_file: String,
    sources: Vec<Pattern>,
    ignores: Vec<Pattern>,
    builder_globs: Vec<String>,
}

impl TargetResolver {
    /// Create a resolver for the repository at `root`
    pub fn new(root: &Path, settings: &DiscoverySettings) -> Result<Self, ResolveError> {
        Ok(Self {
            root: root.to_path_buf(),
            hub_dir: root.join(&settings.hub_dir),
            manifest_file: settings.manifest_file.clone(),
            sources: compile(&settings.source_globs)?,
            ignores: compile(&settings.ignore_globs)?,
            builder_globs: settings.builder_files.clone(),
        })
    }

    /// Repository root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Candidate for an explicitly named directory (relative paths are rooted)
    pub fn candidate(&self, path: &Path) -> Candidate {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        Candidate::new(&self.root, path)
    }

    /// Whether a root-relative path is a component source file
    pub fn is_source(&self, relative: &str) -> bool {
        self.sources
            .iter()
            .any(|p| p.matches_with(relative, MATCH_OPTIONS))
            && !self
                .ignores
                .iter()
                .any(|p| p.matches_with(relative, MATCH_OPTIONS))
    }

    /// Enumerate component directories, sorted by path and deduplicated
    pub fn discover(&self) -> Result<Vec<Candidate>, ResolveError> {
        if !self.hub_dir.is_dir() {
            return Err(ResolveError::HubDirNotFound {
                path: self.hub_dir.clone(),
            });
        }

        let mut components: BTreeMap<PathBuf, Candidate> = BTreeMap::new();
        let mut owners: BTreeMap<String, PathBuf> = BTreeMap::new();

        for entry in WalkDir::new(&self.hub_dir).follow_links(false) {
            let entry = entry.map_err(|e| ResolveError::Walk {
                path: self.hub_dir.clone(),
                error: e.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = relative_slash_path(&self.root, entry.path());
            if !self.is_source(&relative) {
                continue;
            }

            let Some(component_dir) = self.owning_component(entry.path()) else {
                tracing::debug!(file = %relative, "No component manifest above file, ignoring");
                continue;
            };
            if components.contains_key(&component_dir) {
                continue;
            }

            let candidate = Candidate::new(&self.root, component_dir.clone());
            if let Some(other) = owners.get(&candidate.canonical_name) {
                return Err(ResolveError::NameCollision {
                    name: candidate.canonical_name,
                    first: other.clone(),
                    second: component_dir,
                });
            }
            owners.insert(candidate.canonical_name.clone(), component_dir.clone());
            components.insert(component_dir, candidate);
        }

        tracing::info!(count = components.len(), "Discovered components");
        Ok(components.into_values().collect())
    }

    /// Nearest directory at or above `file` (inside the hub subtree) with a manifest
    fn owning_component(&self, file: &Path) -> Option<PathBuf> {
        let mut dir = file.parent();
        while let Some(current) = dir {
            if !current.starts_with(&self.hub_dir) {
                return None;
            }
            if current.join(&self.manifest_file).is_file() {
                return Some(current.to_path_buf());
            }
            dir = current.parent();
        }
        None
    }

    /// Expand the builder's own control files
    pub fn builder_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for pattern in &self.builder_globs {
            let full = self.root.join(pattern);
            let Ok(paths) = glob::glob(&full.to_string_lossy()) else {
                tracing::warn!(pattern = %pattern, "Invalid builder file pattern");
                continue;
            };
            files.extend(paths.filter_map(Result::ok).filter(|p| p.is_file()));
        }
        files.sort();
        files.dedup();
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::generators;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "x").unwrap();
    }

    fn resolver(root: &Path) -> TargetResolver {
        TargetResolver::new(root, &DiscoverySettings::default()).unwrap()
    }

    #[test]
    fn test_canonical_name_strips_root() {
        let root = Path::new("/repo");
        assert_eq!(
            canonical_name(root, Path::new("/repo/hub/encoders/foo")),
            "hub.encoders.foo"
        );
        assert_eq!(canonical_name(root, Path::new("hub/encoders/foo")), "hub.encoders.foo");
        assert_eq!(canonical_name(root, Path::new("./hub/x")), "hub.x");
    }

    #[test]
    fn test_canonical_name_is_total() {
        let root = Path::new("/repo");
        assert_eq!(canonical_name(root, Path::new("/repo")), "");
        assert_eq!(canonical_name(root, Path::new("/repo/.hidden/x")), "hidden.x");
        assert_eq!(canonical_name(root, Path::new("/repo/top")), "top");
    }

    #[test]
    fn test_discover_dedupes_and_ignores() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(root, "hub/encoders/foo/manifest.yml");
        touch(root, "hub/encoders/foo/Dockerfile");
        touch(root, "hub/encoders/foo/app.py");
        touch(root, "hub/encoders/foo/tests/test_foo.py");
        touch(root, "hub/encoders/foo/jina/vendored.py");
        touch(root, "hub/crafters/bar/manifest.yml");
        touch(root, "hub/crafters/bar/Dockerfile");
        touch(root, "hub/notes/readme.md");
        touch(root, "hub/orphan/script.py");

        let candidates = resolver(root).discover().unwrap();
        let names: Vec<&str> = candidates.iter().map(|c| c.canonical_name.as_str()).collect();
        assert_eq!(names, vec!["hub.crafters.bar", "hub.encoders.foo"]);
        assert_eq!(candidates[1].path, root.join("hub/encoders/foo"));
    }

    #[test]
    fn test_vendored_only_component_not_discovered() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(root, "hub/x/jina/manifest.yml");

        let candidates = resolver(root).discover().unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_discover_rejects_name_collision() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(root, "hub/a/b/manifest.yml");
        touch(root, "hub/a.b/manifest.yml");

        let result = resolver(root).discover();
        match result {
            Err(ResolveError::NameCollision { name, .. }) => assert_eq!(name, "hub.a.b"),
            other => panic!("Expected NameCollision, got: {other:?}"),
        }
    }

    #[test]
    fn test_missing_hub_dir() {
        let temp = TempDir::new().unwrap();
        let result = resolver(temp.path()).discover();
        assert!(matches!(result, Err(ResolveError::HubDirNotFound { .. })));
    }

    #[test]
    fn test_invalid_pattern() {
        let settings = DiscoverySettings {
            source_globs: vec!["hub/[".to_string()],
            ..DiscoverySettings::default()
        };
        let result = TargetResolver::new(Path::new("/repo"), &settings);
        assert!(matches!(result, Err(ResolveError::InvalidPattern { .. })));
    }

    #[test]
    fn test_builder_files_expand() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(root, "builder/app.py");
        touch(root, "builder/platforms.yml");
        touch(root, "builder/osi-approved.yml");
        touch(root, "builder/notes.txt");

        let files = resolver(root).builder_files();
        assert_eq!(files.len(), 3);
        assert!(files.contains(&root.join("builder/app.py")));
        assert!(!files.contains(&root.join("builder/notes.txt")));
    }

    #[test]
    fn test_explicit_candidate_is_rooted() {
        let resolver = resolver(Path::new("/repo"));
        let candidate = resolver.candidate(Path::new("hub/encoders/foo"));
        assert_eq!(candidate.path, PathBuf::from("/repo/hub/encoders/foo"));
        assert_eq!(candidate.canonical_name, "hub.encoders.foo");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Distinct descendant paths never share a canonical name
        #[test]
        fn prop_canonical_names_unique(
            paths in proptest::collection::hash_set(generators::component_path(), 2..12)
        ) {
            let root = Path::new("/repo");
            let names: HashSet<String> = paths
                .iter()
                .map(|p| canonical_name(root, &root.join(p)))
                .collect();
            prop_assert_eq!(names.len(), paths.len());
        }

        /// Canonical names never contain separators or leading dots
        #[test]
        fn prop_canonical_name_shape(path in generators::component_path()) {
            let name = canonical_name(Path::new("/repo"), &Path::new("/repo").join(&path));
            prop_assert!(!name.contains('/'));
            prop_assert!(!name.starts_with('.'));
            prop_assert_eq!(name, path.replace('/', "."));
        }
    }
}
