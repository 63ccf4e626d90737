//! Batch check over the registry listing
//! Usage: depcheck registry [--pages N] [--per-page N] [--min-downloads N] [-j N] [-o PATH]

use std::process::ExitCode;

use anyhow::Result;

use crate::config::Config;
use crate::registry::RegistrySource;
use crate::report::ReportFormat;

use super::common::{execute_batch, BatchArgs};

/// Overrides for `[registry]` settings
#[derive(Debug, Clone, Default)]
pub struct RegistryArgs {
    pub pages: Option<u32>,
    pub per_page: Option<u32>,
    pub min_downloads: Option<u64>,
    pub use_repository_source: bool,
}

pub fn execute(mut config: Config, batch: &BatchArgs, args: &RegistryArgs) -> Result<ExitCode> {
    if let Some(pages) = args.pages {
        config.registry.max_pages = Some(pages);
    }
    if let Some(per_page) = args.per_page {
        config.registry.per_page = per_page;
    }
    if let Some(min) = args.min_downloads {
        config.registry.min_downloads = min;
    }
    if args.use_repository_source {
        config.registry.use_repository_source = true;
    }
    batch.apply(&mut config)?;

    let mut source = RegistrySource::new(&config.registry)?;
    execute_batch(&config, &mut source, ReportFormat::WithRepository)
}
