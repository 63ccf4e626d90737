//! depcheck configuration
//!
//! Loaded from TOML. Every field has a default reproducing the Stylus
//! toolchain (`cargo stylus new` / `cargo stylus check`), so the file is
//! optional. Lookup order: explicit `--config`, `./depcheck.toml`, then
//! `<config dir>/depcheck/config.toml`.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::FailureCategory;
use crate::process::CommandSpec;

pub const LOCAL_CONFIG_FILE: &str = "depcheck.toml";

/// Default number of parallel workers
pub const DEFAULT_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub scaffold: ScaffoldConfig,
    pub verify: VerifyConfig,
    pub workspace: WorkspaceConfig,
    pub batch: BatchConfig,
    pub registry: RegistryConfig,
    pub markers: Markers,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScaffoldConfig {
    /// Program and leading arguments; the workspace path is appended
    pub command: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for ScaffoldConfig {
    fn default() -> Self {
        Self {
            command: vec!["cargo".into(), "stylus".into(), "new".into()],
            timeout_secs: 300,
        }
    }
}

impl ScaffoldConfig {
    pub fn command_spec(&self) -> Result<CommandSpec> {
        CommandSpec::from_argv(&self.command).context("Invalid [scaffold] command")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerifyConfig {
    /// Program and arguments, run inside the workspace
    pub command: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            command: vec!["cargo".into(), "stylus".into(), "check".into()],
            timeout_secs: 900,
        }
    }
}

impl VerifyConfig {
    pub fn command_spec(&self) -> Result<CommandSpec> {
        CommandSpec::from_argv(&self.command).context("Invalid [verify] command")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Where the `use` line goes in the generated entry source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportAnchor {
    /// Insert directly after the first line containing this text
    AfterLineContaining(String),
    /// Insert at this zero-based line index. Only valid for one scaffold
    /// template revision; kept for templates without a usable marker.
    Line(usize),
}

impl Default for ImportAnchor {
    fn default() -> Self {
        ImportAnchor::AfterLineContaining("extern crate alloc;".to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkspaceConfig {
    /// Parent directory for all per-task workspaces
    pub root: PathBuf,
    /// Manifest path relative to a workspace
    pub manifest: PathBuf,
    /// Entry source path relative to a workspace
    pub entry_source: PathBuf,
    /// Exact line opening the dependency table
    pub dependency_header: String,
    pub import_anchor: ImportAnchor,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".temp"),
            manifest: PathBuf::from("Cargo.toml"),
            entry_source: PathBuf::from("src/main.rs"),
            dependency_header: "[dependencies]".to_string(),
            import_anchor: ImportAnchor::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    pub concurrency: usize,
    pub report: PathBuf,
    /// Rewrite the report after every N completions (0 = only at the end)
    pub checkpoint_every: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            report: PathBuf::from("assessments.csv"),
            checkpoint_every: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    pub url: String,
    pub per_page: u32,
    pub min_downloads: u64,
    pub max_pages: Option<u32>,
    /// Pin each dependency to its listed repository instead of the registry
    pub use_repository_source: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: "https://crates.io".to_string(),
            per_page: 100,
            min_downloads: 1000,
            max_pages: None,
            use_repository_source: false,
        }
    }
}

/// A known fragment of checker output and the category it implies
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Marker {
    pub category: FailureCategory,
    pub text: String,
}

/// Ordered marker list; the first marker found in the output wins.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Markers(pub Vec<Marker>);

impl Default for Markers {
    fn default() -> Self {
        Markers(vec![
            Marker {
                category: FailureCategory::Compilation,
                text: "could not compile".to_string(),
            },
            Marker {
                category: FailureCategory::Verification,
                text: "program predeployment check failed when checking against ARB_WASM_ADDRESS"
                    .to_string(),
            },
            Marker {
                category: FailureCategory::Build,
                text: "failed to build project to WASM:".to_string(),
            },
        ])
    }
}

impl Config {
    /// Load configuration, falling back to defaults when no file exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            return Self::from_file(&local);
        }

        if let Some(global) = dirs::config_dir().map(|d| d.join("depcheck").join("config.toml")) {
            if global.exists() {
                return Self::from_file(&global);
            }
        }

        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch.concurrency == 0 {
            bail!("batch.concurrency must be at least 1");
        }
        if self.scaffold.command.is_empty() {
            bail!("scaffold.command must name a program");
        }
        if self.verify.command.is_empty() {
            bail!("verify.command must name a program");
        }
        if self.workspace.dependency_header.trim().is_empty() {
            bail!("workspace.dependency_header cannot be empty");
        }
        if let ImportAnchor::AfterLineContaining(marker) = &self.workspace.import_anchor {
            if marker.is_empty() {
                bail!("workspace.import_anchor marker cannot be empty");
            }
        }
        if self.registry.per_page == 0 {
            bail!("registry.per_page must be at least 1");
        }
        Ok(())
    }
}
