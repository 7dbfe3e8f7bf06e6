//! Container image builds with Docker
//!
//! Renders a labelled copy of the component's Dockerfile, runs
//! `docker buildx build`, optionally smoke-tests and pushes the image, and
//! returns `docker inspect` output for the ledger. Every external command
//! runs with a timeout; a non-zero exit, a signal or a timeout is a
//! [`BuildError`], never a crash.

use serde_json::Value;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::runtime::Handle;

use crate::config::{defaults, urls};
use crate::core::coordinator::{BuildEnvironment, BuildOptions, ImageBuilder};
use crate::core::manifest::Manifest;
use crate::core::settings::{HubSettings, ImageSettings};
use crate::core::target::Candidate;
use crate::error::BuildError;
use crate::infra::filesystem;

/// Environment variables holding registry credentials for the readme push
pub const REGISTRY_USER_ENV: &str = "DOCKERHUB_DEVBOT_USER";
/// See [`REGISTRY_USER_ENV`]
pub const REGISTRY_TOKEN_ENV: &str = "DOCKERHUB_DEVBOT_TOKEN";

/// Locate the container engine
fn find_docker() -> Result<PathBuf, BuildError> {
    which::which("docker").map_err(|_| BuildError::RuntimeNotFound {
        program: "docker".to_string(),
    })
}

/// Human-readable command line for logs and errors
fn describe(program: &Path, args: &[String]) -> String {
    let name = program
        .file_name()
        .map_or_else(|| program.display().to_string(), |n| n.to_string_lossy().into_owned());
    std::iter::once(name)
        .chain(args.iter().cloned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run a command with inherited output, killing it after `timeout`
pub async fn run_command(program: &Path, args: &[String], timeout: Duration) -> Result<(), BuildError> {
    let command = describe(program, args);
    tracing::debug!(command = %command, "Running");

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| BuildError::Spawn {
            command: command.clone(),
            error: e.to_string(),
        })?;

    let Ok(waited) = tokio::time::timeout(timeout, child.wait()).await else {
        if let Err(e) = child.kill().await {
            tracing::warn!(command = %command, "Failed to kill timed out process: {e}");
        }
        return Err(BuildError::Timeout {
            command,
            seconds: timeout.as_secs(),
        });
    };

    let status = waited.map_err(|e| BuildError::Spawn {
        command: command.clone(),
        error: e.to_string(),
    })?;
    if status.success() {
        Ok(())
    } else {
        Err(BuildError::CommandFailed {
            command,
            code: status.code(),
        })
    }
}

/// Drive a command future to completion from synchronous build code
///
/// Inside the multi-threaded runtime the current worker is handed off with
/// `block_in_place`; outside any runtime a current-thread runtime is started.
fn block_on<F: Future>(future: F) -> Result<F::Output, BuildError> {
    match Handle::try_current() {
        Ok(handle) => Ok(tokio::task::block_in_place(|| handle.block_on(future))),
        Err(_) => tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map(|runtime| runtime.block_on(future))
            .map_err(|e| BuildError::Spawn {
                command: "tokio runtime".to_string(),
                error: e.to_string(),
            }),
    }
}

/// Blocking form of [`run_command`]
pub fn run_command_blocking(program: &Path, args: &[String], timeout: Duration) -> Result<(), BuildError> {
    block_on(run_command(program, args, timeout))?
}

/// `docker inspect <image>` with captured output
async fn inspect_output(docker: &Path, image: &str, timeout: Duration) -> Result<Vec<u8>, String> {
    let child = Command::new(docker)
        .args(["inspect", image])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| e.to_string())?;

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| format!("timed out after {}s", timeout.as_secs()))?
        .map_err(|e| e.to_string())?;
    if !output.status.success() {
        return Err(String::from_utf8_lossy(&output.stderr).trim().to_string());
    }
    Ok(output.stdout)
}

/// Insert a `LABEL` instruction after every `FROM` line
pub fn render_labeled_dockerfile(dockerfile: &str, labels: &[(String, String)], prefix: &str) -> String {
    let label_block = if labels.is_empty() {
        String::new()
    } else {
        let entries = labels
            .iter()
            .map(|(key, value)| format!("{prefix}{key}=\"{}\"", escape_label(value)))
            .collect::<Vec<_>>()
            .join(" \\\n      ");
        format!("LABEL {entries}\n")
    };

    let mut rendered = String::with_capacity(dockerfile.len() + label_block.len());
    for line in dockerfile.split_inclusive('\n') {
        rendered.push_str(line);
        if line.trim_start().starts_with("FROM") {
            if !line.ends_with('\n') {
                rendered.push('\n');
            }
            rendered.push_str(&label_block);
        }
    }
    rendered
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', " ")
}

/// Readme written for a component that has none
pub fn default_readme(manifest: &Manifest) -> String {
    format!(
        "# {}\n\n{}\n",
        manifest.name().unwrap_or_default(),
        manifest.description().unwrap_or_default()
    )
}

/// Builds hub images with `docker buildx`
#[derive(Debug, Clone)]
pub struct DockerImageBuilder {
    docker: PathBuf,
    root: PathBuf,
    dockerfile: String,
    readme_file: String,
    image: ImageSettings,
    revision: String,
}

impl DockerImageBuilder {
    /// Create a builder for the repository at `root`
    pub fn new(root: &Path, settings: &HubSettings, revision: impl Into<String>) -> Result<Self, BuildError> {
        Ok(Self::with_program(find_docker()?, root, settings, revision))
    }

    /// Create a builder using a specific engine executable
    pub fn with_program(
        docker: PathBuf,
        root: &Path,
        settings: &HubSettings,
        revision: impl Into<String>,
    ) -> Self {
        Self {
            docker,
            root: root.to_path_buf(),
            dockerfile: settings.discovery.dockerfile.clone(),
            readme_file: defaults::README_FILE.to_string(),
            image: settings.image.clone(),
            revision: revision.into(),
        }
    }

    /// `<registry><name>:<version>` and `<registry><name>:latest`
    pub fn image_tags(&self, canonical_name: &str, version: &str) -> (String, String) {
        let repository = format!("{}{canonical_name}", self.image.registry);
        (format!("{repository}:{version}"), format!("{repository}:latest"))
    }

    /// Labels applied to the image: manifest fields plus revision and source
    pub fn labels(&self, manifest: &Manifest) -> Vec<(String, String)> {
        let mut labels = manifest.labels();
        if manifest.get("platform").is_none() {
            labels.push(("platform".to_string(), String::new()));
        }
        labels.push(("revision".to_string(), self.revision.clone()));
        labels.push((
            "source".to_string(),
            format!("{}{}", self.image.source_url_prefix, self.revision),
        ));
        labels
    }

    /// Arguments of the `docker buildx build` invocation
    pub fn build_args(
        &self,
        target: &Candidate,
        manifest: &Manifest,
        dockerfile: &Path,
        tags: &(String, String),
        push: bool,
    ) -> Vec<String> {
        let mut args = vec!["buildx".to_string(), "build".to_string()];
        let platforms = manifest.platforms();
        if !platforms.is_empty() {
            args.push("--platform".to_string());
            args.push(platforms.join(","));
        }
        args.extend([
            "-t".to_string(),
            tags.0.clone(),
            "-t".to_string(),
            tags.1.clone(),
            "--file".to_string(),
            dockerfile.display().to_string(),
            if push { "--push" } else { "--load" }.to_string(),
            target.path.display().to_string(),
        ]);
        args
    }

    fn aux_timeout() -> Duration {
        Duration::from_secs(defaults::AUX_TIMEOUT_SECS)
    }

    fn docker(&self, args: &[&str], timeout: Duration) -> Result<(), BuildError> {
        let args: Vec<String> = args.iter().map(ToString::to_string).collect();
        run_command_blocking(&self.docker, &args, timeout)
    }

    fn vendor(&self, target: &Candidate) -> Result<(), BuildError> {
        let Some(vendor) = &self.image.vendor_source else {
            return Ok(());
        };
        let source = self.root.join(vendor);
        let Some(dir_name) = source.file_name() else {
            return Ok(());
        };
        let destination = target.path.join(dir_name);
        if !destination.is_dir() {
            tracing::info!(component = %target.canonical_name, from = %source.display(), "Copying vendored sources");
            filesystem::copy_tree(&source, &destination)?;
        }
        Ok(())
    }

    fn smoke_test(&self, image: &str) -> Result<(), BuildError> {
        tracing::info!(image, "Testing image with docker run");
        self.docker(
            &["run", "--rm", image, "--max-idle-time", "5", "--shutdown-idle"],
            Self::aux_timeout(),
        )
    }

    fn push_readme(&self, target: &Candidate, manifest: &Manifest) -> Result<(), BuildError> {
        let readme = target.path.join(&self.readme_file);
        if !readme.exists() {
            filesystem::write_file(&readme, default_readme(manifest))?;
        }

        let (Ok(user), Ok(token)) = (
            std::env::var(REGISTRY_USER_ENV),
            std::env::var(REGISTRY_TOKEN_ENV),
        ) else {
            tracing::warn!(
                component = %target.canonical_name,
                "Registry credentials not set, skipping readme upload"
            );
            return Ok(());
        };

        let args = vec![
            "run".to_string(),
            "-v".to_string(),
            format!("{}:/workspace", target.path.display()),
            "-e".to_string(),
            format!("DOCKERHUB_USERNAME={user}"),
            "-e".to_string(),
            format!("DOCKERHUB_PASSWORD={token}"),
            "-e".to_string(),
            format!(
                "DOCKERHUB_REPOSITORY={}{}",
                self.image.registry, target.canonical_name
            ),
            "-e".to_string(),
            "README_FILEPATH=/workspace/README.md".to_string(),
            urls::README_PUSH_IMAGE.to_string(),
        ];
        run_command_blocking(&self.docker, &args, Self::aux_timeout())?;
        tracing::info!(component = %target.canonical_name, "Readme upload finished");
        Ok(())
    }

    /// `docker inspect <image>`, first element
    pub fn inspect(&self, image: &str) -> Result<Value, BuildError> {
        let inspect_error = |error: String| BuildError::Inspect {
            image: image.to_string(),
            error,
        };

        let stdout = block_on(inspect_output(&self.docker, image, Self::aux_timeout()))?
            .map_err(inspect_error)?;
        parse_inspect(&stdout).map_err(inspect_error)
    }
}

/// First element of `docker inspect` JSON output
fn parse_inspect(stdout: &[u8]) -> Result<Value, String> {
    let parsed: Value = serde_json::from_slice(stdout).map_err(|e| e.to_string())?;
    match parsed {
        Value::Array(mut items) if !items.is_empty() => Ok(items.swap_remove(0)),
        _ => Err("no image in inspect output".to_string()),
    }
}

impl ImageBuilder for DockerImageBuilder {
    fn build(
        &self,
        target: &Candidate,
        manifest: &Manifest,
        options: &BuildOptions,
    ) -> Result<Value, BuildError> {
        let name = target.canonical_name.as_str();
        let version = manifest.version().ok_or_else(|| BuildError::Manifest {
            component: name.to_string(),
            message: "a version is required to tag the image".to_string(),
        })?;

        let dockerfile = target.path.join(&self.dockerfile);
        let original = filesystem::read_file(&dockerfile)?;
        let rendered =
            render_labeled_dockerfile(&original, &self.labels(manifest), &self.image.label_prefix);
        let temp_dockerfile = target.path.join(format!("{}.tmp", self.dockerfile));
        filesystem::write_file(&temp_dockerfile, &rendered)?;
        tracing::debug!(component = name, dockerfile = %rendered, "Rendered Dockerfile");

        self.vendor(target)?;

        let tags = self.image_tags(name, &version);
        let args = self.build_args(target, manifest, &temp_dockerfile, &tags, options.push);
        tracing::info!(component = name, image = %tags.0, "Starting docker build");
        let built = run_command_blocking(
            &self.docker,
            &args,
            Duration::from_secs(self.image.build_timeout_secs),
        );
        let _ = std::fs::remove_file(&temp_dockerfile);
        built?;
        tracing::info!(component = name, image = %tags.0, "Successfully built image");

        if options.push {
            self.push_readme(target, manifest)?;
            tracing::info!(component = name, image = %tags.0, "Pulling pushed image");
            self.docker(&["pull", tags.0.as_str()], Self::aux_timeout())?;
        }
        if options.test {
            self.smoke_test(&tags.0)?;
        }

        self.inspect(&tags.0)
    }
}

/// Shell commands that reset the local engine
pub const BLEACH_COMMANDS: &[&str] = &[
    "docker stop $(docker ps -aq)",
    "docker rm -f $(docker ps -aq)",
    "docker rmi -f $(docker images -aq)",
    "docker builder prune -af",
];

/// Resets the local Docker engine before a build
#[derive(Debug, Clone)]
pub struct DockerEnvironment {
    shell: PathBuf,
}

impl DockerEnvironment {
    /// Create an environment using `sh` from `PATH`
    pub fn new() -> Result<Self, BuildError> {
        let shell = which::which("sh").map_err(|_| BuildError::RuntimeNotFound {
            program: "sh".to_string(),
        })?;
        Ok(Self { shell })
    }
}

impl BuildEnvironment for DockerEnvironment {
    fn bleach(&self) -> Result<(), BuildError> {
        tracing::info!("Bleaching docker environment");
        for command in BLEACH_COMMANDS {
            let args = vec!["-c".to_string(), (*command).to_string()];
            if let Err(e) =
                run_command_blocking(&self.shell, &args, Duration::from_secs(defaults::AUX_TIMEOUT_SECS))
            {
                tracing::debug!("{e}");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manifest(content: &str) -> Manifest {
        Manifest::from_yaml(content, Path::new("manifest.yml")).unwrap()
    }

    fn builder() -> DockerImageBuilder {
        DockerImageBuilder::with_program(
            PathBuf::from("docker"),
            Path::new("/repo"),
            &HubSettings::default(),
            "abc1234",
        )
    }

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[test]
    fn test_labels_after_every_from() {
        let dockerfile = "FROM python:3.7 AS base\nRUN pip install x\nFROM base\nCMD [\"run\"]\n";
        let labels = vec![
            ("name".to_string(), "Foo".to_string()),
            ("description".to_string(), "says \"hi\"".to_string()),
        ];
        let rendered = render_labeled_dockerfile(dockerfile, &labels, "ai.jina.hub.");

        assert_eq!(
            rendered,
            "FROM python:3.7 AS base\n\
             LABEL ai.jina.hub.name=\"Foo\" \\\n      ai.jina.hub.description=\"says \\\"hi\\\"\"\n\
             RUN pip install x\n\
             FROM base\n\
             LABEL ai.jina.hub.name=\"Foo\" \\\n      ai.jina.hub.description=\"says \\\"hi\\\"\"\n\
             CMD [\"run\"]\n"
        );
    }

    #[test]
    fn test_from_without_trailing_newline() {
        let rendered = render_labeled_dockerfile(
            "FROM alpine",
            &[("name".to_string(), "x".to_string())],
            "p.",
        );
        assert_eq!(rendered, "FROM alpine\nLABEL p.name=\"x\"\n");
    }

    #[test]
    fn test_labels_include_revision_and_source() {
        let labels = builder().labels(&manifest("name: Foo\ndescription: d\n"));
        assert!(labels.contains(&("revision".to_string(), "abc1234".to_string())));
        assert!(labels.contains(&(
            "source".to_string(),
            "https://github.com/jina-ai/jina-hub/commit/abc1234".to_string()
        )));
        assert!(labels.contains(&("platform".to_string(), String::new())));
    }

    #[test]
    fn test_build_args() {
        let builder = builder();
        let target = Candidate::new(Path::new("/repo"), PathBuf::from("/repo/hub/encoders/foo"));
        let manifest = manifest("name: Foo\ndescription: d\nplatform: [linux/amd64, linux/arm64]\n");
        let tags = builder.image_tags(&target.canonical_name, "0.0.1");
        let args = builder.build_args(
            &target,
            &manifest,
            Path::new("/repo/hub/encoders/foo/Dockerfile.tmp"),
            &tags,
            false,
        );

        assert_eq!(
            args,
            vec![
                "buildx",
                "build",
                "--platform",
                "linux/amd64,linux/arm64",
                "-t",
                "jinaai/hub.encoders.foo:0.0.1",
                "-t",
                "jinaai/hub.encoders.foo:latest",
                "--file",
                "/repo/hub/encoders/foo/Dockerfile.tmp",
                "--load",
                "/repo/hub/encoders/foo",
            ]
        );
    }

    #[test]
    fn test_build_args_push_without_platform() {
        let builder = builder();
        let target = Candidate::new(Path::new("/repo"), PathBuf::from("/repo/hub/a"));
        let tags = builder.image_tags("hub.a", "1.0.0");
        let args = builder.build_args(
            &target,
            &manifest("name: A\ndescription: d\n"),
            Path::new("Dockerfile.tmp"),
            &tags,
            true,
        );
        assert!(!args.contains(&"--platform".to_string()));
        assert!(args.contains(&"--push".to_string()));
    }

    #[test]
    fn test_default_readme() {
        assert_eq!(
            default_readme(&manifest("name: Foo\ndescription: Does foo\n")),
            "# Foo\n\nDoes foo\n"
        );
    }

    #[test]
    fn test_parse_inspect() {
        let value = parse_inspect(br#"[{"Id": "sha256:1"}, {"Id": "sha256:2"}]"#).unwrap();
        assert_eq!(value, json!({"Id": "sha256:1"}));
        assert!(parse_inspect(b"[]").is_err());
        assert!(parse_inspect(b"not json").is_err());
    }

    #[tokio::test]
    async fn test_run_command_exit_code() {
        let result = run_command(Path::new("sh"), &sh("exit 3"), Duration::from_secs(10)).await;
        match result {
            Err(BuildError::CommandFailed { code, .. }) => assert_eq!(code, Some(3)),
            other => panic!("Expected CommandFailed, got: {other:?}"),
        }
        assert!(run_command(Path::new("sh"), &sh("exit 0"), Duration::from_secs(10))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_run_command_timeout_kills_promptly() {
        let started = std::time::Instant::now();
        let result = run_command(Path::new("sh"), &sh("sleep 30"), Duration::from_secs(1)).await;

        assert!(matches!(result, Err(BuildError::Timeout { seconds: 1, .. })));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_run_command_missing_program() {
        let result = run_command(
            Path::new("/definitely/not/a/program"),
            &[],
            Duration::from_secs(1),
        )
        .await;
        assert!(matches!(result, Err(BuildError::Spawn { .. })));
    }

    #[test]
    fn test_blocking_command_outside_runtime() {
        assert!(run_command_blocking(Path::new("sh"), &sh("exit 0"), Duration::from_secs(10)).is_ok());
        assert!(matches!(
            run_command_blocking(Path::new("sh"), &sh("exit 2"), Duration::from_secs(10)),
            Err(BuildError::CommandFailed { code: Some(2), .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_blocking_command_inside_runtime() {
        let result = tokio::task::block_in_place(|| {
            run_command_blocking(Path::new("sh"), &sh("exit 0"), Duration::from_secs(10))
        });
        assert!(result.is_ok());
    }

    #[test]
    fn test_inspect_failure_is_inspect_error() {
        let builder = DockerImageBuilder::with_program(
            PathBuf::from("sh"),
            Path::new("/repo"),
            &HubSettings::default(),
            "abc1234",
        );
        assert!(matches!(
            builder.inspect("jinaai/hub.missing:latest"),
            Err(BuildError::Inspect { .. })
        ));
    }

    #[test]
    fn test_missing_version_is_manifest_error() {
        let target = Candidate::new(Path::new("/repo"), PathBuf::from("/repo/hub/a"));
        let result = builder().build(
            &target,
            &manifest("name: A\ndescription: d\n"),
            &BuildOptions::default(),
        );
        assert!(matches!(result, Err(BuildError::Manifest { .. })));
    }
}
