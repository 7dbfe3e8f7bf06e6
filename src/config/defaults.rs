//! Default configuration values

/// Settings file looked up at the repository root
pub const SETTINGS_FILE: &str = "hub-builder.toml";

/// Subtree that holds the hub components
pub const HUB_DIR: &str = "hub";

/// Per-component manifest file name
pub const MANIFEST_FILE: &str = "manifest.yml";

/// Per-component build recipe file name
pub const DOCKERFILE: &str = "Dockerfile";

/// Per-component readme written before pushing
pub const README_FILE: &str = "README.md";

/// Files whose changes mark a component for rebuild
pub const SOURCE_GLOBS: &[&str] = &["hub/**/*.y*ml", "hub/**/*Dockerfile", "hub/**/*.py"];

/// Vendored copies, CI config and the builder's own subtree
pub const IGNORE_GLOBS: &[&str] = &["hub/**/jina/**", ".github/**", "builder/**"];

/// The builder's own control files; a change here rebuilds everything stale against it
pub const BUILDER_FILES: &[&str] = &["builder/app.py", "builder/*.yml"];

/// Local ledger location
pub const LEDGER_PATH: &str = "status/build-history.json";

/// Status readme carrying the badge section
pub const STATUS_README: &str = "status/README.md";

/// Image-count badge location
pub const HUB_BADGE: &str = "status/hub-stat.svg";

/// Registry namespace prepended to canonical names
pub const REGISTRY: &str = "jinaai/";

/// Prefix of the labels injected into Dockerfiles
pub const LABEL_PREFIX: &str = "ai.jina.hub.";

/// Commit URL prefix recorded as the `source` label
pub const SOURCE_URL_PREFIX: &str = "https://github.com/jina-ai/jina-hub/commit/";

/// Update policy assumed when a manifest declares none
pub const DEFAULT_UPDATE_POLICY: &str = "nightly";

/// Upper bound for a single container engine invocation
pub const BUILD_TIMEOUT_SECS: u64 = 3600; // 1 hour

/// Upper bound for smoke tests, pulls and inspects
pub const AUX_TIMEOUT_SECS: u64 = 600;

/// Total time budget for retrying the remote ledger
pub const REMOTE_RETRY_SECS: u64 = 30;

/// Licences accepted in manifests
pub const APPROVED_LICENSES: &[&str] = &[
    "AGPL-3.0",
    "Apache-2.0",
    "BSD-2-Clause",
    "BSD-3-Clause",
    "BSL-1.0",
    "CC0-1.0",
    "EPL-2.0",
    "GPL-2.0",
    "GPL-3.0",
    "ISC",
    "LGPL-2.1",
    "LGPL-3.0",
    "MIT",
    "MPL-2.0",
    "Unlicense",
    "Zlib",
];

/// Platforms accepted by `docker buildx --platform`
pub const SUPPORTED_PLATFORMS: &[&str] = &[
    "linux/amd64",
    "linux/arm64",
    "linux/arm/v6",
    "linux/arm/v7",
    "linux/386",
    "linux/ppc64le",
    "linux/s390x",
];
