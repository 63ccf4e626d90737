//! Failure taxonomy for a single dependency check
//!
//! Every variant is fatal to the task that raised it and to nothing else:
//! the runner converts them into FAILED outcomes. Cleanup failures are not
//! represented here because workspace removal only ever logs.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckError {
    /// Task fields are empty or unsafe to splice into a manifest
    #[error("invalid task: {0}")]
    Validation(String),

    /// The scaffold command failed or did not produce a project skeleton
    #[error("failed to scaffold workspace at {}: {detail}", path.display())]
    Scaffold { path: PathBuf, detail: String },

    /// The generated manifest does not have the expected shape
    #[error("manifest {}: {detail}", path.display())]
    Manifest { path: PathBuf, detail: String },

    /// The generated entry source does not have the expected shape
    #[error("entry source {}: {detail}", path.display())]
    SourceEdit { path: PathBuf, detail: String },

    /// An external program could not be started or awaited
    #[error("failed to run `{command}`: {source}")]
    Exec {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

impl CheckError {
    pub(crate) fn manifest(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::Manifest {
            path: path.into(),
            detail: detail.into(),
        }
    }

    pub(crate) fn source_edit(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::SourceEdit {
            path: path.into(),
            detail: detail.into(),
        }
    }
}
