//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Test hub repository
///
/// Creates a temporary repository root with a `hub/` subtree and provides
/// utilities for setting up components and build history.
pub struct TestHub {
    /// Temporary directory for the repository
    pub dir: TempDir,
}

#[allow(dead_code)]
impl TestHub {
    /// Create an empty repository with a `hub/` directory
    pub fn new() -> Self {
        let hub = Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        };
        hub.create_dir("hub");
        hub
    }

    /// Get the path to the repository root
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Create a file in the repository
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }

    /// Create a directory in the repository
    pub fn create_dir(&self, name: &str) {
        std::fs::create_dir_all(self.dir.path().join(name)).expect("Failed to create directory");
    }

    /// Add a component with a valid manifest and a Dockerfile
    pub fn add_component(&self, relative: &str) {
        self.create_file(&format!("{relative}/manifest.yml"), SAMPLE_MANIFEST);
        self.create_file(&format!("{relative}/Dockerfile"), SAMPLE_DOCKERFILE);
    }

    /// Write the local build history
    pub fn write_ledger(&self, json: &str) {
        self.create_file("status/build-history.json", json);
    }

    /// Check if a file exists in the repository
    pub fn file_exists(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }

    /// Read a file from the repository
    pub fn read_file(&self, name: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(name)).expect("Failed to read file")
    }
}

impl Default for TestHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Run hub-builder against `root` with a clean environment
#[allow(dead_code)]
pub fn run_hub_builder(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_hub-builder"))
        .current_dir(root)
        .env_remove("HUB_BUILDER_LEDGER_URL")
        .env_remove("HUB_BUILDER_LEDGER_TOKEN")
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("Failed to execute hub-builder")
}

/// Stdout of a finished command
#[allow(dead_code)]
pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Sample component manifest
#[allow(dead_code)]
pub const SAMPLE_MANIFEST: &str = r"
name: FooEncoder
description: Encodes foo into vectors
author: Jina AI Dev-Team (dev-team@jina.ai)
url: https://jina.ai
version: 0.0.1
license: Apache-2.0
update: nightly
";

/// Sample component Dockerfile
#[allow(dead_code)]
pub const SAMPLE_DOCKERFILE: &str = r#"FROM jinaai/jina:devel
COPY . /
ENTRYPOINT ["jina", "pod", "--uses", "config.yml"]
"#;
