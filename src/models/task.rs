use serde::Deserialize;

use crate::errors::CheckError;

/// One dependency/version combination to be checked.
///
/// `source` is a version-control location spliced into the declaration as
/// `git = "..."`. When it is absent the published registry version is used.
/// `repository` is informational only (it ends up in registry reports).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Task {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub repository: Option<String>,
}

impl Task {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            source: None,
            repository: None,
        }
    }

    /// Pin the dependency to a git source
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    /// Source with blank values treated as absent
    pub fn effective_source(&self) -> Option<&str> {
        self.source
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Repository column for reports: the git source if pinned, else the metadata
    pub fn repository_label(&self) -> &str {
        self.effective_source()
            .or(self.repository.as_deref())
            .unwrap_or("")
    }

    /// Reject tasks that cannot be turned into a single manifest line.
    pub fn validate(&self) -> Result<(), CheckError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(CheckError::Validation(
                "Dependency name not provided".to_string(),
            ));
        }
        if self.version.trim().is_empty() {
            return Err(CheckError::Validation(
                "Dependency version not provided".to_string(),
            ));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(CheckError::Validation(format!(
                "dependency name '{name}' contains invalid characters"
            )));
        }
        check_quotable("version", &self.version)?;
        if let Some(source) = self.effective_source() {
            check_quotable("source", source)?;
        }
        Ok(())
    }

    /// Build the manifest dependency line for this task.
    ///
    /// `foo = "1.2.3"` or `foo = {version = "1.2.3", git = "<source>"}`.
    pub fn declaration(&self) -> Result<String, CheckError> {
        self.validate()?;
        let name = self.name.trim();
        let version = self.version.trim();
        Ok(match self.effective_source() {
            None => format!("{name} = \"{version}\""),
            Some(source) => format!("{name} = {{version = \"{version}\", git = \"{source}\"}}"),
        })
    }

    /// Glob import of the dependency's root module
    pub fn import_statement(&self) -> String {
        format!("use {}::*;", self.name.trim().replace('-', "_"))
    }

    /// `name@version`, used in log lines and workspace ids
    pub fn label(&self) -> String {
        format!("{}@{}", self.name.trim(), self.version.trim())
    }
}

fn check_quotable(field: &str, value: &str) -> Result<(), CheckError> {
    if value.contains(['"', '\\', '\n', '\r']) {
        return Err(CheckError::Validation(format!(
            "{field} '{}' contains quotes, backslashes or line breaks",
            value.escape_debug()
        )));
    }
    Ok(())
}
