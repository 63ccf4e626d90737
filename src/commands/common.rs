//! Plumbing shared by the batch-style commands

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;

use crate::batch::{run_batch, BatchOptions, BatchReport, BatchStatus, CancelToken, TaskSource};
use crate::config::Config;
use crate::process::ProcessExecutor;
use crate::report::{ReportFormat, ReportWriter};
use crate::runner::CheckRunner;

/// Exit code for a batch stopped by Ctrl+C after flushing its report
pub const EXIT_INTERRUPTED: u8 = 130;

/// CLI overrides for `[batch]` settings
#[derive(Debug, Clone, Default)]
pub struct BatchArgs {
    pub concurrency: Option<usize>,
    pub report: Option<PathBuf>,
}

impl BatchArgs {
    pub fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(n) = self.concurrency {
            config.batch.concurrency = n;
        }
        if let Some(path) = &self.report {
            config.batch.report = path.clone();
        }
        config.validate()
    }
}

/// First Ctrl+C cancels the token; a second one exits immediately.
pub fn install_interrupt_handler() -> Result<CancelToken> {
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        if handler_token.is_cancelled() {
            eprintln!("\n{}", "Interrupted again, exiting without waiting".red());
            std::process::exit(i32::from(EXIT_INTERRUPTED));
        }
        eprintln!(
            "\n{}",
            "Interrupt received: finishing in-flight checks and writing partial report (Ctrl+C again to abort)"
                .yellow()
        );
        handler_token.cancel();
    })
    .context("Failed to set Ctrl+C handler")?;
    Ok(cancel)
}

/// Check the environment, run the batch, print the summary.
pub fn execute_batch(
    config: &Config,
    source: &mut dyn TaskSource,
    format: ReportFormat,
) -> Result<ExitCode> {
    CheckRunner::preflight(config)?;
    let runner = CheckRunner::new(config, Arc::new(ProcessExecutor))?;
    let writer = ReportWriter::create(&config.batch.report, format)?;
    let cancel = install_interrupt_handler()?;

    let options = BatchOptions {
        concurrency: config.batch.concurrency,
        checkpoint_every: config.batch.checkpoint_every,
    };
    tracing::info!(
        concurrency = options.concurrency,
        report = %writer.path().display(),
        "starting batch"
    );

    let report = run_batch(source, &runner, &options, Some(&writer), &cancel)?;
    print_summary(&report, &writer);

    Ok(match report.status {
        BatchStatus::Completed => ExitCode::SUCCESS,
        BatchStatus::Interrupted => ExitCode::from(EXIT_INTERRUPTED),
    })
}

pub fn print_summary(report: &BatchReport, writer: &ReportWriter) {
    let summary = report.summary();
    println!();
    match report.status {
        BatchStatus::Completed => println!("{}", "Batch complete".bold()),
        BatchStatus::Interrupted => println!(
            "{}",
            format!(
                "Batch interrupted: {} of {} dispatched task(s) recorded",
                summary.total(),
                report.dispatched
            )
            .yellow()
            .bold()
        ),
    }
    println!(
        "  {} {}   {} {}",
        "passed:".green(),
        summary.passed,
        "failed:".red(),
        summary.failed
    );
    if summary.failed > 0 {
        println!(
            "  compilation: {}  verification: {}  build: {}  unknown: {}",
            summary.compilation, summary.verification, summary.build, summary.unknown
        );
    }
    println!("  report: {}", writer.path().display());
}
