use serde::Deserialize;
use std::fmt;
use std::time::Duration;

use super::task::Task;

/// Final verdict of one task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckResult {
    Passed,
    Failed,
}

impl CheckResult {
    /// Only a clean zero exit passes; signals and timeouts fail
    pub fn from_exit_code(code: Option<i32>) -> Self {
        if code == Some(0) {
            CheckResult::Passed
        } else {
            CheckResult::Failed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckResult::Passed => "PASSED",
            CheckResult::Failed => "FAILED",
        }
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a failed task failed, derived from marker substrings in its output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCategory {
    Compilation,
    Verification,
    Build,
    Unknown,
}

impl FailureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::Compilation => "COMPILATION",
            FailureCategory::Verification => "VERIFICATION",
            FailureCategory::Build => "BUILD",
            FailureCategory::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of one task's result.
///
/// Constructed only through [`Outcome::passed`] and [`Outcome::failed`], so a
/// PASSED outcome never carries a category and a FAILED one always does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    task: Task,
    result: CheckResult,
    category: Option<FailureCategory>,
    detail: Option<String>,
    duration: Duration,
}

impl Outcome {
    pub fn passed(task: Task, duration: Duration) -> Self {
        Self {
            task,
            result: CheckResult::Passed,
            category: None,
            detail: None,
            duration,
        }
    }

    /// `detail` is the captured error text kept for display
    pub fn failed(
        task: Task,
        category: FailureCategory,
        detail: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            task,
            result: CheckResult::Failed,
            category: Some(category),
            detail: Some(detail.into()),
            duration,
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn name(&self) -> &str {
        self.task.name.trim()
    }

    pub fn version(&self) -> &str {
        self.task.version.trim()
    }

    pub fn source(&self) -> Option<&str> {
        self.task.effective_source()
    }

    pub fn result(&self) -> CheckResult {
        self.result
    }

    pub fn failure_category(&self) -> Option<FailureCategory> {
        self.category
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn is_passed(&self) -> bool {
        self.result == CheckResult::Passed
    }

    pub fn summary(&self) -> String {
        let ms = self.duration.as_millis();
        match self.category {
            Some(category) => format!(
                "{} - {} ({category}, {ms}ms)",
                self.result,
                self.task.label()
            ),
            None => format!("{} - {} ({ms}ms)", self.result, self.task.label()),
        }
    }
}
