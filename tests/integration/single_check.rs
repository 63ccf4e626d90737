//! Single task runs: what reaches the workspace and what is left behind

use std::sync::Arc;

use depcheck::config::ImportAnchor;
use depcheck::models::{CheckResult, FailureCategory, Task};
use depcheck::process::ProcessExecutor;
use depcheck::runner::{CheckRunner, TaskRunner};
use tempfile::TempDir;

use super::helpers::{fake_config, leftover_workspaces};

/// Verifier that fails on purpose and dumps the edited files
const DUMP_VERIFY: &str = "cat Cargo.toml src/main.rs >&2; exit 1";

#[test]
fn test_git_source_declaration_reaches_manifest() {
    let temp = TempDir::new().unwrap();
    let mut config = fake_config(temp.path());
    config.verify.command = vec!["sh".into(), "-c".into(), DUMP_VERIFY.into()];
    let runner = CheckRunner::new(&config, Arc::new(ProcessExecutor)).unwrap();

    let task = Task::new("my-dep", "1.2.3").with_source("https://github.com/x/my-dep");
    let outcome = runner.run(&task);

    assert_eq!(outcome.result(), CheckResult::Failed);
    let dump = outcome.detail().unwrap();
    assert!(dump.contains(
        "[dependencies]\nmy-dep = {version = \"1.2.3\", git = \"https://github.com/x/my-dep\"}\nstylus-sdk"
    ));
    assert!(dump.contains("extern crate alloc;\nuse my_dep::*;\n"));
    assert_eq!(leftover_workspaces(&config), 0);
}

#[test]
fn test_passing_check() {
    let temp = TempDir::new().unwrap();
    let config = fake_config(temp.path());
    let runner = CheckRunner::new(&config, Arc::new(ProcessExecutor)).unwrap();

    let outcome = runner.run(&Task::new("good", "1.0.0"));
    assert_eq!(outcome.result(), CheckResult::Passed);
    assert_eq!(outcome.failure_category(), None);
    assert_eq!(leftover_workspaces(&config), 0);
}

#[test]
fn test_missing_import_anchor_fails_task() {
    let temp = TempDir::new().unwrap();
    let mut config = fake_config(temp.path());
    config.workspace.import_anchor = ImportAnchor::AfterLineContaining("#[entrypoint]".into());
    let runner = CheckRunner::new(&config, Arc::new(ProcessExecutor)).unwrap();

    let outcome = runner.run(&Task::new("good", "1.0.0"));
    assert_eq!(outcome.result(), CheckResult::Failed);
    assert_eq!(outcome.failure_category(), Some(FailureCategory::Unknown));
    assert!(outcome.detail().unwrap().contains("#[entrypoint]"));
    assert_eq!(leftover_workspaces(&config), 0);
}

#[test]
fn test_verification_timeout() {
    let temp = TempDir::new().unwrap();
    let mut config = fake_config(temp.path());
    config.verify.command = vec!["sh".into(), "-c".into(), "exec sleep 30".into()];
    config.verify.timeout_secs = 1;
    let runner = CheckRunner::new(&config, Arc::new(ProcessExecutor)).unwrap();

    let outcome = runner.run(&Task::new("slow", "1.0.0"));
    assert_eq!(outcome.result(), CheckResult::Failed);
    assert!(outcome.detail().unwrap().contains("timeout"));
    assert_eq!(leftover_workspaces(&config), 0);
}

#[test]
fn test_preflight_reports_missing_toolchain() {
    let temp = TempDir::new().unwrap();
    let mut config = fake_config(temp.path());
    config.verify.command = vec!["depcheck-missing-verifier-xyz".into()];
    let err = CheckRunner::preflight(&config).unwrap_err();
    assert!(err.to_string().contains("depcheck-missing-verifier-xyz"));

    let config = fake_config(temp.path());
    CheckRunner::preflight(&config).unwrap();
}

#[test]
fn test_preflight_creates_workspace_root() {
    let temp = TempDir::new().unwrap();
    let config = fake_config(temp.path());
    assert!(!config.workspace.root.exists());
    CheckRunner::preflight(&config).unwrap();
    assert!(config.workspace.root.is_dir());
    assert_eq!(leftover_workspaces(&config), 0);
}
