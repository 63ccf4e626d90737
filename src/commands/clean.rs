//! Remove leftover workspaces
//! Usage: depcheck clean
//!
//! Workspaces are removed as each task finishes, so leftovers only exist
//! after the process was killed outright. Do not run this while a batch is
//! using the same workspace root.

use std::sync::Arc;

use anyhow::Result;

use crate::config::Config;
use crate::process::ProcessExecutor;
use crate::workspace::WorkspaceManager;

pub fn execute(config: &Config) -> Result<()> {
    let manager = WorkspaceManager::new(
        config.workspace.clone(),
        &config.scaffold,
        Arc::new(ProcessExecutor),
    )?;

    let removed = manager.purge_stale()?;
    if removed == 0 {
        println!("Nothing to clean.");
    } else {
        println!(
            "Removed {removed} leftover workspace(s) from {}",
            manager.root().display()
        );
    }
    Ok(())
}
