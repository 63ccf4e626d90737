//! Task sources feeding the batch coordinator
//!
//! A source hands out tasks a page at a time and says explicitly when it is
//! exhausted, so the coordinator never needs to know the total up front.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::models::Task;

pub trait TaskSource {
    /// Next page of tasks, or `None` once there are no more pages.
    /// An empty page is allowed and does not end the listing.
    fn next_page(&mut self) -> Result<Option<Vec<Task>>>;
}

/// A pre-materialised task list served as a single page
#[derive(Debug, Default)]
pub struct ListSource {
    tasks: Option<Vec<Task>>,
}

impl ListSource {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self { tasks: Some(tasks) }
    }
}

impl TaskSource for ListSource {
    fn next_page(&mut self) -> Result<Option<Vec<Task>>> {
        Ok(self.tasks.take())
    }
}

/// TOML task list:
///
/// ```toml
/// [[task]]
/// name = "foo"
/// version = "1.2.3"
/// source = "https://github.com/x/foo"   # optional
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskFile {
    #[serde(default, rename = "task")]
    pub tasks: Vec<Task>,
}

impl TaskFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read task file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse task file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn into_source(self) -> ListSource {
        ListSource::new(self.tasks)
    }
}
