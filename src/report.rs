//! CSV assessment report
//!
//! The report is rewritten wholesale on every flush: rows go to a sibling
//! temporary file which is then renamed over the target, so a reader (or a
//! crash) only ever sees a complete previous or complete new report. An
//! advisory lock on `<report>.lock` keeps two batches from writing the same
//! file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use tempfile::NamedTempFile;

use crate::models::Outcome;

/// Column layout of the report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// `name,version,result`
    Plain,
    /// `name,repo,version,result`
    WithRepository,
}

impl ReportFormat {
    pub fn header(&self) -> &'static [&'static str] {
        match self {
            ReportFormat::Plain => &["name", "version", "result"],
            ReportFormat::WithRepository => &["name", "repo", "version", "result"],
        }
    }

    fn row<'a>(&self, outcome: &'a Outcome) -> Vec<&'a str> {
        match self {
            ReportFormat::Plain => vec![
                outcome.name(),
                outcome.version(),
                outcome.result().as_str(),
            ],
            ReportFormat::WithRepository => vec![
                outcome.name(),
                outcome.task().repository_label(),
                outcome.version(),
                outcome.result().as_str(),
            ],
        }
    }
}

/// Render the full report text
pub fn render(format: ReportFormat, outcomes: &[Outcome]) -> String {
    let mut out = String::new();
    push_record(&mut out, format.header());
    for outcome in outcomes {
        push_record(&mut out, &format.row(outcome));
    }
    out
}

fn push_record(out: &mut String, fields: &[&str]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&escape_field(field));
    }
    out.push_str("\r\n");
}

/// RFC 4180 quoting: wrap in quotes when needed, double embedded quotes
fn escape_field(field: &str) -> std::borrow::Cow<'_, str> {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\"")).into()
    } else {
        field.into()
    }
}

/// Exclusive writer for one report file
#[derive(Debug)]
pub struct ReportWriter {
    path: PathBuf,
    format: ReportFormat,
    // Held for the writer's lifetime
    lock: File,
}

impl ReportWriter {
    /// Lock the report and write an empty (header-only) report.
    ///
    /// Failing here means the destination is unusable, which aborts the
    /// batch before any task runs.
    pub fn create(path: &Path, format: ReportFormat) -> Result<Self> {
        let lock_path = lock_path(path);
        let lock = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open report lock: {}", lock_path.display()))?;
        lock.try_lock_exclusive().with_context(|| {
            format!(
                "Report {} is locked by another batch ({})",
                path.display(),
                lock_path.display()
            )
        })?;

        let writer = Self {
            path: path.to_path_buf(),
            format,
            lock,
        };
        writer.write(&[])?;
        Ok(writer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the report contents with `outcomes`
    pub fn write(&self, outcomes: &[Outcome]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temporary report in {}", dir.display()))?;

        let mut out = BufWriter::new(tmp.as_file());
        out.write_all(render(self.format, outcomes).as_bytes())
            .context("Failed to write report")?;
        out.flush().context("Failed to flush report")?;
        drop(out);
        tmp.as_file().sync_all().context("Failed to sync report")?;

        tmp.persist(&self.path)
            .with_context(|| format!("Failed to replace report {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), rows = outcomes.len(), "report flushed");
        Ok(())
    }
}

impl Drop for ReportWriter {
    fn drop(&mut self) {
        let _ = self.lock.unlock();
        let _ = std::fs::remove_file(lock_path(&self.path));
    }
}

fn lock_path(report: &Path) -> PathBuf {
    let mut name = report
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "report".into());
    name.push(".lock");
    report.with_file_name(name)
}
