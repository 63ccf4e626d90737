//! Batch coordinator
//!
//! Fans tasks out over a fixed pool of worker threads. The calling thread
//! pulls pages from a [`TaskSource`] and feeds a bounded queue; each worker
//! takes the next queued task, runs it to completion and records the
//! outcome in a shared [`Accumulator`]. Outcomes land in completion order.
//!
//! Cancellation is cooperative: once the [`CancelToken`] fires, dispatch
//! stops, queued tasks are skipped, the report is flushed with what has
//! completed, and in-flight tasks are waited for only so their workspaces
//! get removed. Their outcomes are not recorded.

pub mod source;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};

use crate::models::{CheckResult, FailureCategory, Outcome, Task};
use crate::report::ReportWriter;
use crate::runner::TaskRunner;

pub use source::{ListSource, TaskFile, TaskSource};

/// How often blocked dispatch and the final wait re-check cancellation
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Shared cancellation flag, set from a signal handler
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub concurrency: usize,
    /// Flush the report after every N recorded outcomes; 0 disables
    pub checkpoint_every: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: crate::config::DEFAULT_CONCURRENCY,
            checkpoint_every: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// Every dispatched task ran
    Completed,
    /// Stopped early by the cancel token
    Interrupted,
}

/// Result of a batch: the outcomes in completion order
#[derive(Debug)]
pub struct BatchReport {
    pub outcomes: Vec<Outcome>,
    pub status: BatchStatus,
    /// Tasks pulled from the source and queued
    pub dispatched: usize,
}

impl BatchReport {
    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for outcome in &self.outcomes {
            match outcome.result() {
                CheckResult::Passed => summary.passed += 1,
                CheckResult::Failed => summary.failed += 1,
            }
            match outcome.failure_category() {
                Some(FailureCategory::Compilation) => summary.compilation += 1,
                Some(FailureCategory::Verification) => summary.verification += 1,
                Some(FailureCategory::Build) => summary.build += 1,
                Some(FailureCategory::Unknown) => summary.unknown += 1,
                None => {}
            }
        }
        summary
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub passed: usize,
    pub failed: usize,
    pub compilation: usize,
    pub verification: usize,
    pub build: usize,
    pub unknown: usize,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.passed + self.failed
    }
}

/// Outcomes recorded so far, plus the report they are flushed to.
///
/// The only state shared between workers. Recording stops the moment the
/// cancel token fires. Report writes happen outside the outcome lock, so
/// workers keep recording while a checkpoint is on disk.
pub struct Accumulator<'a> {
    state: Mutex<Vec<Outcome>>,
    /// Row count of the last report write; serialises writers
    written: Mutex<usize>,
    report: Option<&'a ReportWriter>,
    checkpoint_every: usize,
    cancel: &'a CancelToken,
}

impl<'a> Accumulator<'a> {
    pub fn new(
        report: Option<&'a ReportWriter>,
        checkpoint_every: usize,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            state: Mutex::new(Vec::new()),
            written: Mutex::new(0),
            report,
            checkpoint_every,
            cancel,
        }
    }

    /// Append an outcome; returns false if it arrived after cancellation.
    pub fn record(&self, outcome: Outcome) -> bool {
        let snapshot = {
            let mut outcomes = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if self.cancel.is_cancelled() {
                tracing::info!(
                    task = %outcome.task().label(),
                    "discarding outcome completed after interrupt"
                );
                return false;
            }
            outcomes.push(outcome);

            let due = self.checkpoint_every > 0 && outcomes.len() % self.checkpoint_every == 0;
            (due && self.report.is_some()).then(|| outcomes.clone())
        };

        if let Some(snapshot) = snapshot {
            // A failed checkpoint is not fatal; the final flush reports errors.
            if let Err(e) = self.write(&snapshot, false) {
                tracing::warn!(error = %e, "report checkpoint failed");
            }
        }
        true
    }

    /// Write everything recorded so far to the report
    pub fn flush(&self) -> Result<()> {
        if self.report.is_none() {
            return Ok(());
        }
        let snapshot = self.state.lock().unwrap_or_else(|e| e.into_inner()).clone();
        self.write(&snapshot, true)
    }

    /// Outcomes only grow, so a snapshot no longer than the last write is
    /// stale and a checkpoint skips it.
    fn write(&self, snapshot: &[Outcome], force: bool) -> Result<()> {
        let Some(report) = self.report else {
            return Ok(());
        };
        let mut written = self.written.lock().unwrap_or_else(|e| e.into_inner());
        if snapshot.len() < *written || (!force && snapshot.len() == *written) {
            return Ok(());
        }
        report.write(snapshot)?;
        *written = snapshot.len();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_outcomes(self) -> Vec<Outcome> {
        self.state.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

/// Run every task from `source` through `runner` on `options.concurrency`
/// workers and flush the outcomes to `report`.
///
/// The report is flushed on completion, on interruption (before waiting for
/// in-flight tasks) and when the source fails. A source failure is returned
/// as an error after the partial report has been written.
pub fn run_batch(
    source: &mut dyn TaskSource,
    runner: &dyn TaskRunner,
    options: &BatchOptions,
    report: Option<&ReportWriter>,
    cancel: &CancelToken,
) -> Result<BatchReport> {
    if options.concurrency == 0 {
        bail!("concurrency must be at least 1");
    }

    let accumulator = Accumulator::new(report, options.checkpoint_every, cancel);
    let (tx, rx) = mpsc::sync_channel::<Task>(options.concurrency);
    let rx = Mutex::new(rx);

    let mut dispatched = 0usize;
    let mut source_error = None;
    let mut interrupt_flushed = false;

    thread::scope(|scope| {
        let handles: Vec<_> = (0..options.concurrency)
            .map(|worker| {
                let rx = &rx;
                let accumulator = &accumulator;
                thread::Builder::new()
                    .name(format!("depcheck-worker-{worker}"))
                    .spawn_scoped(scope, move || work(worker, rx, runner, accumulator, cancel))
            })
            .collect();

        // Workers that failed to spawn are simply absent; at least one must exist.
        let running = handles.iter().filter(|h| h.is_ok()).count();
        if running == 0 {
            source_error = Some(anyhow::anyhow!("failed to spawn any worker thread"));
        } else {
            match dispatch(source, &tx, cancel, &mut dispatched) {
                Ok(()) => {}
                Err(e) => source_error = Some(e),
            }
        }
        // Closing the queue lets idle workers exit.
        drop(tx);

        if source_error.is_some() {
            if let Err(e) = accumulator.flush() {
                tracing::error!(error = %e, "failed to flush partial report");
            }
        }

        // Wait for workers, flushing immediately if an interrupt arrives.
        loop {
            if cancel.is_cancelled() && !interrupt_flushed {
                tracing::info!(
                    completed = accumulator.len(),
                    "interrupted, flushing partial report"
                );
                if let Err(e) = accumulator.flush() {
                    tracing::error!(error = %e, "failed to flush partial report");
                }
                interrupt_flushed = true;
            }
            let finished = handles
                .iter()
                .filter_map(|h| h.as_ref().ok())
                .all(|h| h.is_finished());
            if finished {
                break;
            }
            thread::sleep(CANCEL_POLL_INTERVAL);
        }
    });

    let status = if cancel.is_cancelled() {
        BatchStatus::Interrupted
    } else {
        BatchStatus::Completed
    };

    accumulator.flush()?;
    let outcomes = accumulator.into_outcomes();

    if let Some(e) = source_error {
        return Err(e.context(format!(
            "Task source failed after {} task(s); partial report written",
            outcomes.len()
        )));
    }

    Ok(BatchReport {
        outcomes,
        status,
        dispatched,
    })
}

/// Pull pages until the source is exhausted or the batch is cancelled.
fn dispatch(
    source: &mut dyn TaskSource,
    tx: &SyncSender<Task>,
    cancel: &CancelToken,
    dispatched: &mut usize,
) -> Result<()> {
    while !cancel.is_cancelled() {
        let Some(page) = source.next_page()? else {
            tracing::debug!(dispatched = *dispatched, "task source exhausted");
            return Ok(());
        };
        for task in page {
            if !enqueue(tx, task, cancel) {
                return Ok(());
            }
            *dispatched += 1;
        }
    }
    Ok(())
}

/// Block until the task is queued; false if cancelled or no worker is left.
fn enqueue(tx: &SyncSender<Task>, mut task: Task, cancel: &CancelToken) -> bool {
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        match tx.try_send(task) {
            Ok(()) => return true,
            Err(TrySendError::Full(t)) => {
                task = t;
                thread::sleep(CANCEL_POLL_INTERVAL);
            }
            Err(TrySendError::Disconnected(_)) => return false,
        }
    }
}

fn work(
    worker: usize,
    rx: &Mutex<Receiver<Task>>,
    runner: &dyn TaskRunner,
    accumulator: &Accumulator<'_>,
    cancel: &CancelToken,
) {
    loop {
        let next = rx.lock().unwrap_or_else(|e| e.into_inner()).recv();
        let Ok(task) = next else {
            break;
        };
        if cancel.is_cancelled() {
            tracing::debug!(worker, task = %task.label(), "skipping queued task after interrupt");
            continue;
        }
        let outcome = runner.run(&task);
        accumulator.record(outcome);
    }
    tracing::debug!(worker, "worker finished");
}
