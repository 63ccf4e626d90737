//! End-to-end batch runs against the fake toolchain

use std::collections::HashMap;
use std::sync::Arc;

use depcheck::batch::{run_batch, BatchOptions, BatchStatus, CancelToken, ListSource};
use depcheck::commands::common::execute_batch;
use depcheck::models::{CheckResult, FailureCategory, Task};
use depcheck::process::ProcessExecutor;
use depcheck::report::{ReportFormat, ReportWriter};
use depcheck::runner::CheckRunner;
use tempfile::TempDir;

use super::helpers::{fake_config, leftover_workspaces};

fn mixed_tasks() -> Vec<Task> {
    vec![
        Task::new("good-a", "1.0.0"),
        Task::new("good-b", "0.2.1").with_source("https://github.com/x/good-b"),
        Task::new("bad-compile", "1.0.0"),
        Task::new("bad-wasm", "2.0.0"),
        Task::new("bad-deploy", "0.0.1"),
        Task::new("bad-other", "3.1.4"),
        Task::new("good-c", "0.9.0"),
        Task::new("good-d", "0.1.0"),
        Task::new("", "1.0.0"),
        Task::new("good-e", "4.0.0"),
    ]
}

#[test]
fn test_mixed_batch_reports_every_task_and_cleans_up() {
    let temp = TempDir::new().unwrap();
    let config = fake_config(temp.path());
    let runner = CheckRunner::new(&config, Arc::new(ProcessExecutor)).unwrap();
    let writer = ReportWriter::create(&config.batch.report, ReportFormat::Plain).unwrap();
    let mut source = ListSource::new(mixed_tasks());

    let report = run_batch(
        &mut source,
        &runner,
        &BatchOptions {
            concurrency: 3,
            checkpoint_every: 1,
        },
        Some(&writer),
        &CancelToken::new(),
    )
    .unwrap();

    assert_eq!(report.status, BatchStatus::Completed);
    assert_eq!(report.outcomes.len(), 10);
    assert_eq!(leftover_workspaces(&config), 0);

    let by_name: HashMap<&str, _> = report
        .outcomes
        .iter()
        .map(|o| (o.name(), (o.result(), o.failure_category())))
        .collect();
    assert_eq!(by_name.len(), 10);
    assert_eq!(by_name["good-a"], (CheckResult::Passed, None));
    assert_eq!(by_name["good-b"], (CheckResult::Passed, None));
    assert_eq!(
        by_name["bad-compile"],
        (CheckResult::Failed, Some(FailureCategory::Compilation))
    );
    assert_eq!(
        by_name["bad-wasm"],
        (CheckResult::Failed, Some(FailureCategory::Build))
    );
    assert_eq!(
        by_name["bad-deploy"],
        (CheckResult::Failed, Some(FailureCategory::Verification))
    );
    assert_eq!(
        by_name["bad-other"],
        (CheckResult::Failed, Some(FailureCategory::Unknown))
    );
    assert_eq!(
        by_name[""],
        (CheckResult::Failed, Some(FailureCategory::Unknown))
    );

    let text = std::fs::read_to_string(&config.batch.report).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "name,version,result");
    assert_eq!(lines.len(), 11);
    assert!(lines.contains(&"bad-wasm,2.0.0,FAILED"));
    assert!(lines.contains(&"good-e,4.0.0,PASSED"));

    let summary = report.summary();
    assert_eq!(summary.passed, 5);
    assert_eq!(summary.failed, 5);
    assert_eq!(summary.unknown, 2);
}

#[test]
fn test_repeat_runs_classify_identically() {
    let temp = TempDir::new().unwrap();
    let config = fake_config(temp.path());
    let runner = CheckRunner::new(&config, Arc::new(ProcessExecutor)).unwrap();
    let tasks = vec![Task::new("bad-wasm", "1.0.0"), Task::new("bad-wasm", "1.0.0")];
    let mut source = ListSource::new(tasks);

    let report = run_batch(
        &mut source,
        &runner,
        &BatchOptions {
            concurrency: 2,
            checkpoint_every: 0,
        },
        None,
        &CancelToken::new(),
    )
    .unwrap();

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(
        report.outcomes[0].failure_category(),
        report.outcomes[1].failure_category()
    );
    assert_eq!(leftover_workspaces(&config), 0);
}

#[test]
fn test_template_without_dependency_table() {
    let temp = TempDir::new().unwrap();
    let mut config = fake_config(temp.path());
    config.scaffold.command = vec![
        "sh".into(),
        "-c".into(),
        r#"mkdir -p "$0/src" && printf '[package]\nname = "x"\n' > "$0/Cargo.toml" && printf 'extern crate alloc;\n' > "$0/src/main.rs""#.into(),
    ];
    let runner = CheckRunner::new(&config, Arc::new(ProcessExecutor)).unwrap();
    let mut source = ListSource::new(vec![Task::new("good-a", "1.0.0"), Task::new("good-b", "1.0.0")]);

    let report = run_batch(
        &mut source,
        &runner,
        &BatchOptions {
            concurrency: 2,
            checkpoint_every: 1,
        },
        None,
        &CancelToken::new(),
    )
    .unwrap();

    assert_eq!(report.outcomes.len(), 2);
    for outcome in &report.outcomes {
        assert_eq!(outcome.result(), CheckResult::Failed);
        assert_eq!(outcome.failure_category(), Some(FailureCategory::Unknown));
        assert!(outcome.detail().unwrap().contains("table not found"));
    }
    assert_eq!(leftover_workspaces(&config), 0);
}

#[test]
fn test_registry_layout_report() {
    let temp = TempDir::new().unwrap();
    let config = fake_config(temp.path());
    let runner = CheckRunner::new(&config, Arc::new(ProcessExecutor)).unwrap();
    let writer =
        ReportWriter::create(&config.batch.report, ReportFormat::WithRepository).unwrap();
    let mut source = ListSource::new(vec![
        Task::new("good-a", "1.0.0").with_repository("https://github.com/x/good-a")
    ]);

    run_batch(
        &mut source,
        &runner,
        &BatchOptions::default(),
        Some(&writer),
        &CancelToken::new(),
    )
    .unwrap();

    let text = std::fs::read_to_string(&config.batch.report).unwrap();
    assert_eq!(
        text,
        "name,repo,version,result\r\ngood-a,https://github.com/x/good-a,1.0.0,PASSED\r\n"
    );
}

#[test]
fn test_unwritable_workspace_root_aborts_before_any_task() {
    let temp = TempDir::new().unwrap();
    let mut config = fake_config(temp.path());
    let blocker = temp.path().join("not-a-dir");
    std::fs::write(&blocker, "file").unwrap();
    config.workspace.root = blocker.join(".temp");

    let mut source = ListSource::new(vec![Task::new("good-a", "1.0.0")]);
    let err = execute_batch(&config, &mut source, ReportFormat::Plain).unwrap_err();

    assert!(format!("{err:#}").contains("workspace root"));
    assert!(!config.batch.report.exists());
}
