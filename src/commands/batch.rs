//! Batch check from a task file
//! Usage: depcheck batch <TASKS_FILE> [-j N] [-o PATH]

use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;

use crate::batch::TaskFile;
use crate::config::Config;
use crate::report::ReportFormat;

use super::common::{execute_batch, BatchArgs};

pub fn execute(mut config: Config, tasks_file: &Path, args: &BatchArgs) -> Result<ExitCode> {
    args.apply(&mut config)?;

    let file = TaskFile::load(tasks_file)?;
    tracing::info!(
        tasks = file.tasks.len(),
        file = %tasks_file.display(),
        "loaded task file"
    );

    let mut source = file.into_source();
    execute_batch(&config, &mut source, ReportFormat::Plain)
}
