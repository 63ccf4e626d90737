//! Paginated crate listing from a crates.io-compatible registry
//!
//! Each page yields crate records (name, repository, newest version) and a
//! `meta.next_page` query string. A missing or empty `next_page` ends the
//! listing.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::batch::TaskSource;
use crate::config::RegistryConfig;
use crate::models::Task;

const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;
const HTTP_REQUEST_TIMEOUT_SECS: u64 = 60;
const CRATES_ENDPOINT: &str = "/api/v1/crates";

#[derive(Debug, Deserialize)]
struct CratesPage {
    crates: Vec<CrateRecord>,
    meta: PageMeta,
}

#[derive(Debug, Deserialize)]
struct CrateRecord {
    name: String,
    #[serde(default)]
    repository: Option<String>,
    #[serde(default)]
    newest_version: Option<String>,
    #[serde(default)]
    max_version: Option<String>,
    #[serde(default)]
    downloads: u64,
}

#[derive(Debug, Deserialize)]
struct PageMeta {
    #[serde(default)]
    next_page: Option<String>,
}

/// Which listed crates become tasks, and how
#[derive(Debug, Clone)]
pub struct ListingFilter {
    pub min_downloads: u64,
    pub use_repository_source: bool,
}

impl From<&RegistryConfig> for ListingFilter {
    fn from(config: &RegistryConfig) -> Self {
        Self {
            min_downloads: config.min_downloads,
            use_repository_source: config.use_repository_source,
        }
    }
}

/// One parsed page: the tasks it yields and the token for the next page
#[derive(Debug)]
pub struct Page {
    pub tasks: Vec<Task>,
    pub next: Option<String>,
}

/// Parse a listing response body
pub fn parse_page(body: &str, filter: &ListingFilter) -> Result<Page> {
    let page: CratesPage =
        serde_json::from_str(body).context("Failed to parse registry listing")?;

    let tasks = page
        .crates
        .into_iter()
        .filter(|c| c.downloads >= filter.min_downloads)
        .filter_map(|c| {
            let version = c
                .newest_version
                .filter(|v| !v.is_empty())
                .or(c.max_version.filter(|v| !v.is_empty()))?;
            let repository = c.repository.filter(|r| !r.trim().is_empty());
            let mut task = Task::new(c.name, version);
            if let Some(repo) = repository {
                if filter.use_repository_source {
                    task = task.with_source(repo.clone());
                }
                task = task.with_repository(repo);
            }
            Some(task)
        })
        .collect();

    let next = page.meta.next_page.filter(|n| !n.trim().is_empty());
    Ok(Page { tasks, next })
}

/// Streams tasks page by page from the registry
pub struct RegistrySource {
    client: Client,
    base_url: String,
    per_page: u32,
    max_pages: Option<u32>,
    filter: ListingFilter,
    /// Query string for the next request; `None` once the listing ended
    next: Option<String>,
    pages_fetched: u32,
}

impl RegistrySource {
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("depcheck/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            per_page: config.per_page,
            max_pages: config.max_pages,
            filter: ListingFilter::from(config),
            next: Some(format!("?page=1&per_page={}&sort=downloads", config.per_page)),
            pages_fetched: 0,
        })
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    fn fetch(&self, query: &str) -> Result<String> {
        let url = format!("{}{CRATES_ENDPOINT}{query}", self.base_url);
        tracing::debug!(%url, "fetching registry page");

        let response = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("Failed to fetch {url}"))?;
        if !response.status().is_success() {
            let status = response.status();
            bail!(
                "Registry listing {url}: HTTP {} - {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown error")
            );
        }
        response
            .text()
            .with_context(|| format!("Failed to read response body from {url}"))
    }
}

impl TaskSource for RegistrySource {
    fn next_page(&mut self) -> Result<Option<Vec<Task>>> {
        if let Some(max) = self.max_pages {
            if self.pages_fetched >= max {
                return Ok(None);
            }
        }
        let Some(query) = self.next.take() else {
            return Ok(None);
        };

        let body = self.fetch(&query)?;
        let page = parse_page(&body, &self.filter)?;
        self.pages_fetched += 1;
        self.next = page.next;

        tracing::info!(
            page = self.pages_fetched,
            per_page = self.per_page,
            tasks = page.tasks.len(),
            more = self.next.is_some(),
            "registry page"
        );
        Ok(Some(page.tasks))
    }
}
