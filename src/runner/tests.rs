//! Tests for CheckRunner against a scripted executor

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::*;
use crate::config::Config;
use crate::models::{CheckResult, FailureCategory};

/// Scaffolds like the real tool and answers verification with a fixed reply
struct ScriptedExecutor {
    verify_reply: CommandOutput,
    scaffold_ok: bool,
    calls: Mutex<Vec<String>>,
    verified_in: Mutex<Vec<PathBuf>>,
}

impl ScriptedExecutor {
    fn new(exit_code: Option<i32>, stderr: &str) -> Self {
        Self {
            verify_reply: CommandOutput {
                exit_code,
                stdout: String::new(),
                stderr: stderr.to_string(),
                timed_out: false,
                duration: Duration::from_millis(1),
            },
            scaffold_ok: true,
            calls: Mutex::new(Vec::new()),
            verified_in: Mutex::new(Vec::new()),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Executor for ScriptedExecutor {
    fn execute(
        &self,
        command: &CommandSpec,
        working_dir: Option<&Path>,
        _timeout: Duration,
    ) -> Result<CommandOutput, CheckError> {
        self.calls.lock().unwrap().push(command.display());

        let is_scaffold = command.args.iter().any(|a| a == "new");
        if is_scaffold {
            let target = PathBuf::from(command.args.last().unwrap());
            if !self.scaffold_ok {
                return Ok(CommandOutput {
                    exit_code: Some(1),
                    stdout: String::new(),
                    stderr: "error: could not compile `scaffold`".to_string(),
                    timed_out: false,
                    duration: Duration::ZERO,
                });
            }
            std::fs::create_dir_all(target.join("src")).unwrap();
            std::fs::write(
                target.join("Cargo.toml"),
                "[package]\nname = \"t\"\n\n[dependencies]\n",
            )
            .unwrap();
            std::fs::write(target.join("src/main.rs"), "extern crate alloc;\n").unwrap();
            return Ok(CommandOutput {
                exit_code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
                timed_out: false,
                duration: Duration::ZERO,
            });
        }

        let dir = working_dir.unwrap().to_path_buf();
        assert!(dir.join("Cargo.toml").exists(), "verified outside a workspace");
        self.verified_in.lock().unwrap().push(dir);
        Ok(self.verify_reply.clone())
    }
}

fn runner(root: &Path, executor: Arc<ScriptedExecutor>) -> CheckRunner {
    let mut config = Config::default();
    config.workspace.root = root.to_path_buf();
    CheckRunner::new(&config, executor).unwrap()
}

fn leftover_dirs(root: &Path) -> usize {
    std::fs::read_dir(root).map(|it| it.count()).unwrap_or(0)
}

#[test]
fn test_exit_zero_passes_without_category() {
    let temp = tempfile::tempdir().unwrap();
    let exec = Arc::new(ScriptedExecutor::new(Some(0), "warning: unused"));
    let outcome = runner(temp.path(), exec.clone()).run(&Task::new("foo", "1.2.3"));

    assert_eq!(outcome.result(), CheckResult::Passed);
    assert_eq!(outcome.failure_category(), None);
    assert_eq!(exec.call_count(), 2);
    assert_eq!(leftover_dirs(temp.path()), 0);
}

#[test]
fn test_verification_failure_is_classified() {
    let temp = tempfile::tempdir().unwrap();
    let exec = Arc::new(ScriptedExecutor::new(
        Some(1),
        "failed to build project to WASM: oops\nerror: could not compile `foo`",
    ));
    let outcome = runner(temp.path(), exec).run(&Task::new("foo", "1.2.3"));

    assert_eq!(outcome.result(), CheckResult::Failed);
    assert_eq!(
        outcome.failure_category(),
        Some(FailureCategory::Compilation)
    );
    assert!(outcome.detail().unwrap().contains("could not compile"));
    assert_eq!(leftover_dirs(temp.path()), 0);
}

#[test]
fn test_unmatched_failure_is_unknown() {
    let temp = tempfile::tempdir().unwrap();
    let exec = Arc::new(ScriptedExecutor::new(Some(101), "something else"));
    let outcome = runner(temp.path(), exec).run(&Task::new("foo", "1"));
    assert_eq!(outcome.failure_category(), Some(FailureCategory::Unknown));
}

#[test]
fn test_killed_verifier_fails() {
    let temp = tempfile::tempdir().unwrap();
    let exec = Arc::new(ScriptedExecutor::new(None, ""));
    let outcome = runner(temp.path(), exec).run(&Task::new("foo", "1"));
    assert_eq!(outcome.result(), CheckResult::Failed);
}

#[test]
fn test_invalid_task_runs_nothing() {
    let temp = tempfile::tempdir().unwrap();
    let exec = Arc::new(ScriptedExecutor::new(Some(0), ""));
    let runner = runner(temp.path(), exec.clone());

    for task in [Task::new("", "1.0.0"), Task::new("foo", ""), Task::new("foo", " ")] {
        let outcome = runner.run(&task);
        assert_eq!(outcome.result(), CheckResult::Failed);
        assert_eq!(outcome.failure_category(), Some(FailureCategory::Unknown));
    }
    assert_eq!(exec.call_count(), 0);
    assert_eq!(leftover_dirs(temp.path()), 0);
}

#[test]
fn test_scaffold_failure_becomes_outcome() {
    let temp = tempfile::tempdir().unwrap();
    let mut exec = ScriptedExecutor::new(Some(0), "");
    exec.scaffold_ok = false;
    let exec = Arc::new(exec);
    let outcome = runner(temp.path(), exec.clone()).run(&Task::new("foo", "1"));

    assert_eq!(outcome.result(), CheckResult::Failed);
    // Scaffold stderr happens to carry a known marker
    assert_eq!(
        outcome.failure_category(),
        Some(FailureCategory::Compilation)
    );
    assert_eq!(exec.call_count(), 1);
    assert_eq!(leftover_dirs(temp.path()), 0);
}

#[test]
fn test_each_run_uses_fresh_workspace() {
    let temp = tempfile::tempdir().unwrap();
    let exec = Arc::new(ScriptedExecutor::new(Some(1), "could not compile"));
    let runner = runner(temp.path(), exec.clone());
    let task = Task::new("foo", "1");

    let first = runner.run(&task);
    let second = runner.run(&task);
    assert_eq!(first.failure_category(), second.failure_category());

    let dirs = exec.verified_in.lock().unwrap();
    assert_eq!(dirs.len(), 2);
    assert_ne!(dirs[0], dirs[1]);
    assert_eq!(leftover_dirs(temp.path()), 0);
}

#[test]
fn test_large_output_is_classified_then_capped() {
    let temp = tempfile::tempdir().unwrap();
    // Marker sits at the very start, far outside the retained tail.
    let noise = "x".repeat(4 * MAX_DETAIL_BYTES);
    let stderr = format!("error: could not compile `foo`\n{noise}\nlast line");
    let exec = Arc::new(ScriptedExecutor::new(Some(101), &stderr));
    let outcome = runner(temp.path(), exec).run(&Task::new("foo", "1"));

    assert_eq!(
        outcome.failure_category(),
        Some(FailureCategory::Compilation)
    );
    let detail = outcome.detail().unwrap();
    assert!(detail.len() < MAX_DETAIL_BYTES + 64);
    assert!(detail.ends_with("last line"));
    assert!(detail.starts_with("[... "));
}

#[test]
fn test_detail_tail_respects_char_boundaries() {
    let text = "é".repeat(MAX_DETAIL_BYTES);
    let tail = detail_tail(&text);
    assert!(tail.ends_with('é'));
    assert_eq!(detail_tail("short"), "short");
}
