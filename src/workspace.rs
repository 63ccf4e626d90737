//! Per-task scaffold workspaces
//!
//! Each task gets its own freshly scaffolded project under the workspace
//! root, named `{timestamp}-{random}-{crate}` so concurrent tasks never share
//! a path. A [`Workspace`] removes its directory when dropped, so every exit
//! path of a task releases it.
//!
//! ## Module structure
//!
//! - `manifest`: dependency line injection into the generated manifest
//! - `source`: import line injection into the generated entry source

mod manifest;
mod source;

pub use manifest::inject_dependency_line;
pub use source::inject_import_line;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::config::{ScaffoldConfig, WorkspaceConfig};
use crate::errors::CheckError;
use crate::models::Task;
use crate::process::{CommandSpec, Executor};

/// Longest crate-name suffix kept in a workspace id
const MAX_NAME_SUFFIX: usize = 48;

/// Creates and edits scaffolded workspaces
pub struct WorkspaceManager {
    layout: WorkspaceConfig,
    scaffold: CommandSpec,
    scaffold_timeout: std::time::Duration,
    executor: Arc<dyn Executor>,
}

/// An isolated scaffold project owned by exactly one task
#[derive(Debug)]
pub struct Workspace {
    id: String,
    path: PathBuf,
    manifest_path: PathBuf,
    entry_source_path: PathBuf,
}

impl WorkspaceManager {
    pub fn new(
        layout: WorkspaceConfig,
        scaffold: &ScaffoldConfig,
        executor: Arc<dyn Executor>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            layout,
            scaffold: scaffold.command_spec()?,
            scaffold_timeout: scaffold.timeout(),
            executor,
        })
    }

    pub fn root(&self) -> &Path {
        &self.layout.root
    }

    /// Scaffold a fresh workspace for `task`.
    ///
    /// Fails with [`CheckError::Scaffold`] if the scaffold command exits
    /// non-zero or leaves no manifest behind. A partially created directory
    /// is removed before returning.
    pub fn create(&self, task: &Task) -> Result<Workspace, CheckError> {
        let id = workspace_id(&task.name);
        let path = self.layout.root.join(&id);

        fs::create_dir_all(&self.layout.root).map_err(|e| CheckError::Scaffold {
            path: path.clone(),
            detail: format!(
                "cannot create workspace root {}: {e}",
                self.layout.root.display()
            ),
        })?;

        // From here on the guard owns the path, so failures below clean up.
        let workspace = Workspace {
            manifest_path: path.join(&self.layout.manifest),
            entry_source_path: path.join(&self.layout.entry_source),
            id,
            path,
        };

        let command = self.scaffold.clone().arg(workspace.path.as_os_str());
        let output = self
            .executor
            .execute(&command, None, self.scaffold_timeout)
            .map_err(|e| CheckError::Scaffold {
                path: workspace.path.clone(),
                detail: e.to_string(),
            })?;

        if !output.success() {
            let detail = if output.timed_out {
                format!("scaffold timed out: {}", output.stderr.trim())
            } else {
                format!(
                    "scaffold exited with {:?}: {}",
                    output.exit_code,
                    output.combined().trim()
                )
            };
            return Err(CheckError::Scaffold {
                path: workspace.path.clone(),
                detail,
            });
        }

        if !workspace.manifest_path.is_file() {
            return Err(CheckError::Scaffold {
                path: workspace.path.clone(),
                detail: format!(
                    "scaffold produced no {}",
                    self.layout.manifest.display()
                ),
            });
        }

        tracing::debug!(workspace = %workspace.id, task = %task.label(), "workspace created");
        Ok(workspace)
    }

    /// Insert `declaration` right after the dependency table header
    pub fn inject_dependency(
        &self,
        workspace: &Workspace,
        declaration: &str,
    ) -> Result<(), CheckError> {
        inject_dependency_line(
            &workspace.manifest_path,
            &self.layout.dependency_header,
            declaration,
        )
    }

    /// Insert the task's import line at the configured anchor
    pub fn inject_import(&self, workspace: &Workspace, task: &Task) -> Result<(), CheckError> {
        inject_import_line(
            &workspace.entry_source_path,
            &self.layout.import_anchor,
            &task.import_statement(),
        )
    }

    /// Remove leftover workspace directories under the workspace root.
    ///
    /// Only directories named like a [`workspace_id`] are touched, so a root
    /// shared with other files (even `.`) keeps everything else. Only
    /// meaningful when no batch is running; live workspaces clean up after
    /// themselves. Returns the number of directories removed.
    pub fn purge_stale(&self) -> anyhow::Result<usize> {
        use anyhow::Context;

        if !self.layout.root.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        let entries = fs::read_dir(&self.layout.root).with_context(|| {
            format!(
                "Failed to read workspace root {}",
                self.layout.root.display()
            )
        })?;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            if !name.to_str().is_some_and(is_workspace_id) {
                tracing::debug!(path = %entry.path().display(), "not a workspace, keeping");
                continue;
            }
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(entry.path())
                    .with_context(|| format!("Failed to remove {}", entry.path().display()))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl Workspace {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    pub fn entry_source_path(&self) -> &Path {
        &self.entry_source_path
    }

    /// Remove the workspace directory now instead of at end of scope
    pub fn destroy(self) {
        drop(self);
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if !self.path.exists() {
            return;
        }
        match fs::remove_dir_all(&self.path) {
            Ok(()) => tracing::debug!(workspace = %self.id, "workspace removed"),
            Err(e) => tracing::warn!(
                workspace = %self.id,
                path = %self.path.display(),
                error = %e,
                "failed to clean up workspace"
            ),
        }
    }
}

/// `{UTC timestamp}-{8 random hex}-{sanitised name}`
///
/// The random component keeps ids unique even when many tasks start in the
/// same second; the name is only there to make leftovers recognisable.
pub fn workspace_id(name: &str) -> String {
    let stamp = Utc::now().format("%Y%m%d%H%M%S");
    let random = Uuid::new_v4().simple().to_string();
    let suffix: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_NAME_SUFFIX)
        .collect();
    if suffix.is_empty() {
        format!("{stamp}-{}", &random[..8])
    } else {
        format!("{stamp}-{}-{suffix}", &random[..8])
    }
}

/// Whether `name` has the shape produced by [`workspace_id`]
pub fn is_workspace_id(name: &str) -> bool {
    let (stamp, rest) = name.split_at_checked(14).unwrap_or((name, ""));
    if stamp.len() != 14 || !stamp.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let Some(rest) = rest.strip_prefix('-') else {
        return false;
    };
    let (random, suffix) = rest.split_at_checked(8).unwrap_or((rest, ""));
    if random.len() != 8 || !random.bytes().all(|b| b.is_ascii_hexdigit()) {
        return false;
    }
    match suffix.strip_prefix('-') {
        None => suffix.is_empty(),
        Some(name) => {
            !name.is_empty()
                && name
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        }
    }
}
