//! Integration tests for `hub-builder build`
//!
//! Covers the paths that stop before the container engine is needed:
//! - `--check-targets` reports whether anything is stale
//! - a missing `--target` is an error only with `--error-on-empty`
//! - a missing hub directory is a configuration error

mod common;

use common::{run_hub_builder, stdout, TestHub};

#[test]
fn test_check_targets_never_built_component() {
    let hub = TestHub::new();
    hub.add_component("hub/encoders/foo");

    let output = run_hub_builder(&hub.path(), &["build", "--check-targets"]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout(&output).contains("hub.encoders.foo"));
}

#[test]
fn test_check_targets_empty_hub_fails() {
    let hub = TestHub::new();

    let output = run_hub_builder(&hub.path(), &["build", "--check-targets"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("Nothing to build"));
}

#[test]
fn test_check_targets_up_to_date_component() {
    let hub = TestHub::new();
    hub.add_component("hub/encoders/foo");
    hub.write_ledger(
        r#"{
            "Images": {},
            "LastBuildTime": {"hub.encoders.foo": 4000000000},
            "LastBuildStatus": {"hub.encoders.foo": "success"},
            "LastBuildReason": ""
        }"#,
    );

    let output = run_hub_builder(&hub.path(), &["build", "--check-targets"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("Nothing to build"));
}

#[test]
fn test_check_targets_on_release_rebuilds_everything() {
    let hub = TestHub::new();
    hub.add_component("hub/encoders/foo");
    hub.add_component("hub/crafters/bar");
    hub.write_ledger(
        r#"{
            "LastBuildTime": {"hub.encoders.foo": 4000000000, "hub.crafters.bar": 4000000000},
            "LastBuildStatus": {"hub.encoders.foo": "success", "hub.crafters.bar": "success"}
        }"#,
    );

    let output = run_hub_builder(
        &hub.path(),
        &["build", "--check-targets", "--update-strategy", "on-release"],
    );

    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("hub.encoders.foo"));
    assert!(out.contains("hub.crafters.bar"));
}

#[test]
fn test_check_targets_does_not_touch_history() {
    let hub = TestHub::new();
    hub.add_component("hub/encoders/foo");

    let output = run_hub_builder(&hub.path(), &["build", "--check-targets"]);

    assert!(output.status.success());
    assert!(!hub.file_exists("status/build-history.json"));
    assert!(!hub.file_exists("status/README.md"));
}

#[test]
fn test_missing_target_is_not_an_error_by_default() {
    let hub = TestHub::new();

    let output = run_hub_builder(&hub.path(), &["build", "--target", "hub/encoders/missing"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("Nothing to build"));
}

#[test]
fn test_missing_target_with_error_on_empty_fails() {
    let hub = TestHub::new();

    let output = run_hub_builder(
        &hub.path(),
        &["build", "--target", "hub/encoders/missing", "--error-on-empty"],
    );

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("does not exist"));
}

#[test]
fn test_existing_target_check_only() {
    let hub = TestHub::new();
    hub.add_component("hub/encoders/foo");

    let output = run_hub_builder(
        &hub.path(),
        &["build", "--target", "hub/encoders/foo", "--check-targets"],
    );

    assert!(output.status.success());
    assert!(stdout(&output).contains("hub.encoders.foo"));
}

#[test]
fn test_missing_hub_directory_fails() {
    let dir = tempfile::TempDir::new().unwrap();

    let output = run_hub_builder(dir.path(), &["build", "--check-targets"]);

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_root_flag_overrides_working_directory() {
    let hub = TestHub::new();
    hub.add_component("hub/encoders/foo");
    let elsewhere = tempfile::TempDir::new().unwrap();

    let root = hub.path();
    let output = run_hub_builder(
        elsewhere.path(),
        &["--root", root.to_str().unwrap(), "build", "--check-targets"],
    );

    assert!(output.status.success());
    assert!(stdout(&output).contains("hub.encoders.foo"));
}

#[test]
fn test_check_targets_applies_update_policy() {
    let hub = TestHub::new();
    hub.add_component("hub/encoders/foo");

    let output = run_hub_builder(
        &hub.path(),
        &["build", "--check-targets", "--update-strategy", "on-master"],
    );

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("Nothing to build"));
}
