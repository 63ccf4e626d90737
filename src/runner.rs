//! Task execution: scaffold, inject, verify, classify
//!
//! A runner never fails. Every error between validation and verification
//! turns into a FAILED [`Outcome`], and the workspace is released on every
//! path because it is a scoped guard.

pub mod classify;

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};

use crate::config::{Config, Markers};
use crate::errors::CheckError;
use crate::models::{CheckResult, Outcome, Task};
use crate::process::{CommandOutput, CommandSpec, Executor};
use crate::workspace::WorkspaceManager;

pub use classify::categorize;

/// Bytes of checker output kept on a failed outcome. The marker scan runs
/// over the full text first; only the tail is retained for display.
pub const MAX_DETAIL_BYTES: usize = 8 * 1024;

/// Turns a task into an outcome. Implementations must not panic on task
/// failures and must be shareable across worker threads.
pub trait TaskRunner: Sync {
    fn run(&self, task: &Task) -> Outcome;
}

/// Runs the external verification command against a scaffolded workspace
pub struct CheckRunner {
    workspaces: WorkspaceManager,
    verify: CommandSpec,
    verify_timeout: Duration,
    executor: Arc<dyn Executor>,
    markers: Markers,
}

impl CheckRunner {
    pub fn new(config: &Config, executor: Arc<dyn Executor>) -> Result<Self> {
        Ok(Self {
            workspaces: WorkspaceManager::new(
                config.workspace.clone(),
                &config.scaffold,
                executor.clone(),
            )?,
            verify: config.verify.command_spec()?,
            verify_timeout: config.verify.timeout(),
            executor,
            markers: config.markers.clone(),
        })
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    /// Fail fast when the external toolchain is not installed or the
    /// workspace root cannot hold workspaces.
    pub fn preflight(config: &Config) -> Result<()> {
        ensure_workspace_root(&config.workspace.root)?;
        let scaffold = config.scaffold.command_spec()?;
        if !scaffold.is_available() {
            bail!(
                "Scaffold program `{}` not found in PATH (configured as `{}`)",
                scaffold.program,
                scaffold.display()
            );
        }
        let verify = config.verify.command_spec()?;
        if !verify.is_available() {
            bail!(
                "Verification program `{}` not found in PATH (configured as `{}`)",
                verify.program,
                verify.display()
            );
        }
        Ok(())
    }

    /// Everything up to the verifier's exit; the workspace drops on return.
    fn verify_in_workspace(&self, task: &Task) -> Result<CommandOutput, CheckError> {
        // Built before anything external runs, so bad tasks cost nothing.
        let declaration = task.declaration()?;

        let workspace = self.workspaces.create(task)?;
        tracing::info!(task = %task.label(), workspace = %workspace.id(), "checking");

        self.workspaces.inject_dependency(&workspace, &declaration)?;
        self.workspaces.inject_import(&workspace, task)?;

        self.executor
            .execute(&self.verify, Some(workspace.path()), self.verify_timeout)
    }
}

impl TaskRunner for CheckRunner {
    fn run(&self, task: &Task) -> Outcome {
        let start = Instant::now();

        let outcome = match self.verify_in_workspace(task) {
            Ok(output) if CheckResult::from_exit_code(output.exit_code) == CheckResult::Passed => {
                Outcome::passed(task.clone(), start.elapsed())
            }
            Ok(output) => {
                let text = output.combined();
                let category = categorize(&self.markers, &text);
                Outcome::failed(task.clone(), category, detail_tail(&text), start.elapsed())
            }
            Err(err) => {
                let text = err.to_string();
                let category = categorize(&self.markers, &text);
                tracing::warn!(task = %task.label(), error = %err, "task could not be verified");
                Outcome::failed(task.clone(), category, detail_tail(&text), start.elapsed())
            }
        };

        match outcome.failure_category() {
            None => tracing::info!(task = %task.label(), "PASSED"),
            Some(category) => tracing::info!(task = %task.label(), category = %category, "FAILED"),
        }
        outcome
    }
}

/// Create the workspace root and prove a directory can be made inside it.
fn ensure_workspace_root(root: &Path) -> Result<()> {
    fs::create_dir_all(root)
        .with_context(|| format!("Cannot create workspace root {}", root.display()))?;
    let scratch = tempfile::Builder::new()
        .prefix(".depcheck-write-")
        .tempdir_in(root)
        .with_context(|| format!("Workspace root {} is not writable", root.display()))?;
    scratch
        .close()
        .with_context(|| format!("Cannot clean up {}", root.display()))?;
    Ok(())
}

/// Last `MAX_DETAIL_BYTES` of `text`, cut on a char boundary
fn detail_tail(text: &str) -> String {
    if text.len() <= MAX_DETAIL_BYTES {
        return text.to_string();
    }
    let mut cut = text.len() - MAX_DETAIL_BYTES;
    while !text.is_char_boundary(cut) {
        cut += 1;
    }
    format!("[... {cut} bytes omitted]\n{}", &text[cut..])
}

#[cfg(test)]
mod tests;
