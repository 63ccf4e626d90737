//! Single dependency check
//! Usage: depcheck check <NAME> <VERSION> [--repo <URL>]

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;

use crate::config::Config;
use crate::models::{Outcome, Task};
use crate::process::ProcessExecutor;
use crate::runner::{CheckRunner, TaskRunner};

/// Execute the check command
///
/// Exits 0 when the dependency passes and 1 when it fails. A missing
/// toolchain is an error rather than a failed check.
pub fn execute(
    config: &Config,
    name: String,
    version: String,
    repo: Option<String>,
) -> Result<ExitCode> {
    let mut task = Task::new(name, version);
    if let Some(repo) = repo {
        task = task.with_source(repo);
    }
    // Reject bad input before touching the toolchain.
    task.validate()?;
    CheckRunner::preflight(config)?;

    println!(
        "{}",
        format!("Checking {} for toolchain compatibility", task.label()).blue()
    );

    let runner = CheckRunner::new(config, Arc::new(ProcessExecutor))?;
    let outcome = runner.run(&task);
    print_outcome(&outcome);

    Ok(if outcome.is_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_outcome(outcome: &Outcome) {
    if outcome.is_passed() {
        println!("\n{}\n", " ====== PASSED ====== ".green().bold());
        println!(
            "Dependency {}:{} verified successfully",
            outcome.name(),
            outcome.version()
        );
        return;
    }

    println!("\n{}\n", " ====== FAILED ====== ".red().bold());
    if let Some(category) = outcome.failure_category() {
        println!("Failure category: {}", category.to_string().red());
    }
    if let Some(detail) = outcome.detail() {
        println!("{}", detail.trim_end().dimmed());
    }
    println!("\nDependency verification failed, consider using another package instead");
}
