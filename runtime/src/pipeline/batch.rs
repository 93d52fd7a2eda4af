// Copyright 2026 Quoteshot Contributors
// SPDX-License-Identifier: Apache-2.0

//! Batch driver: one run directory, one browser, every task exactly once.
//!
//! Tasks are processed in input order. With `workers > 1` each worker owns
//! its own tab; an order-preserving bounded stream hands results back in
//! task order, so the collected results always line up with the manifest.
//! A lost browser session stops new tasks; whatever already finished is kept
//! and the rest are recorded as skipped.

use super::artifacts::RunDirectory;
use super::orchestrator::Orchestrator;
use super::report::write_reports;
use super::{BatchError, ResourceResult};
use crate::audit::logger::{AuditEvent, AuditLogger};
use crate::config::CaptureConfig;
use crate::extract::rules::{normalize_domain, RuleBook};
use crate::manifest::ExtractionTask;
use crate::progress::{ProgressEmitter, ProgressEventKind, ProgressSender, TaskStatus};
use crate::renderer::{RenderContext, RenderError, Renderer};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

/// Format of the per-run directory name (UTC).
pub const RUN_ID_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Reason recorded on tasks that never ran because the browser went away.
pub const SKIP_REASON: &str = "browser session lost";

/// Counts over a finished batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub completed: usize,
    pub navigation_failures: usize,
    pub capture_failures: usize,
    pub skipped: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[ResourceResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Self::default()
        };
        for r in results {
            match r.status() {
                TaskStatus::Completed => summary.completed += 1,
                TaskStatus::CaptureFailed => summary.capture_failures += 1,
                TaskStatus::NavigationFailed => summary.navigation_failures += 1,
                TaskStatus::Skipped => summary.skipped += 1,
            }
        }
        summary
    }
}

/// A single invocation over one manifest.
#[derive(Debug)]
pub struct BatchRun {
    pub output_directory: PathBuf,
    pub started_at: DateTime<Utc>,
    pub tasks: Vec<ExtractionTask>,
    pub results: Vec<ResourceResult>,
    /// Set when the browser session was lost before every task ran.
    pub aborted: Option<String>,
}

impl BatchRun {
    pub fn summary(&self) -> BatchSummary {
        BatchSummary::from_results(&self.results)
    }

    /// Whether the manifest produced no tasks (nothing was launched).
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Pool of idle tabs shared by the workers.
struct ContextPool {
    tx: mpsc::UnboundedSender<Box<dyn RenderContext>>,
    rx: Mutex<mpsc::UnboundedReceiver<Box<dyn RenderContext>>>,
}

impl ContextPool {
    fn new(contexts: Vec<Box<dyn RenderContext>>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        for ctx in contexts {
            let _ = tx.send(ctx);
        }
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    async fn acquire(&self) -> Option<Box<dyn RenderContext>> {
        self.rx.lock().await.recv().await
    }

    fn release(&self, ctx: Box<dyn RenderContext>) {
        let _ = self.tx.send(ctx);
    }

    /// Close every idle tab. Tabs still held by abandoned workers go away
    /// with the browser.
    async fn close_all(&self) {
        let mut rx = self.rx.lock().await;
        while let Ok(ctx) = rx.try_recv() {
            let _ = ctx.close().await;
        }
    }
}

/// Run a whole batch.
///
/// Creates `<output_root>/<YYYYMMDD_HHMMSS>/`. With no tasks it writes
/// `NO_DATA.txt` and returns without launching the browser. Otherwise the
/// browser from `launch` is used for every task and shut down on every exit
/// path before the outputs are flushed.
pub async fn run<R, F, Fut>(
    input: &Path,
    tasks: Vec<ExtractionTask>,
    output_root: &Path,
    config: &CaptureConfig,
    rules: &RuleBook,
    progress: Option<ProgressSender>,
    launch: F,
) -> Result<BatchRun, BatchError>
where
    R: Renderer,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<R, RenderError>>,
{
    let started_at = Utc::now();
    let run_id = started_at.format(RUN_ID_FORMAT).to_string();
    let run_dir = RunDirectory::create(output_root, &run_id)?;
    let mut batch = BatchRun {
        output_directory: run_dir.path().to_path_buf(),
        started_at,
        tasks,
        results: Vec::new(),
        aborted: None,
    };

    run_dir.write_run_summary(input, batch.tasks.len())?;
    if batch.tasks.is_empty() {
        warn!("no tasks parsed from {}", input.display());
        run_dir.write_no_data(input)?;
        return Ok(batch);
    }

    let emitter = ProgressEmitter::new(progress, run_id);
    emitter.emit(ProgressEventKind::BatchStarted {
        total: batch.tasks.len(),
    });
    info!(
        "processing {} task(s) into {}",
        batch.tasks.len(),
        run_dir.path().display()
    );

    let clock = Instant::now();
    let mut audit = AuditLogger::open(run_dir.path())
        .map_err(|e| std::io::Error::other(format!("{e:#}")))?;

    let mut slots: Vec<Option<ResourceResult>> = vec![None; batch.tasks.len()];
    match launch().await {
        Ok(renderer) => {
            let outcome = execute(
                &batch.tasks,
                &mut slots,
                &renderer,
                rules,
                config,
                &run_dir,
                &emitter,
                &mut audit,
            )
            .await;
            if let Err(e) = renderer.shutdown().await {
                warn!("browser shutdown failed: {e}");
            }
            match outcome {
                Ok(()) => {}
                Err(BatchError::SessionLost(reason)) => batch.aborted = Some(reason),
                Err(e) => return Err(e),
            }
        }
        Err(e) => {
            warn!("browser unavailable: {e}");
            batch.aborted = Some(e.to_string());
        }
    }

    if let Some(reason) = &batch.aborted {
        warn!(
            "batch aborted after {} of {} task(s): {reason}",
            slots.iter().flatten().count(),
            batch.tasks.len()
        );
        emitter.emit(ProgressEventKind::Warning {
            message: format!("browser session lost: {reason}"),
        });
    }
    let now_local = Utc::now().with_timezone(&config.timezone).to_rfc3339();
    batch.results = slots
        .into_iter()
        .zip(&batch.tasks)
        .map(|(slot, task)| {
            slot.unwrap_or_else(|| {
                ResourceResult::skipped(
                    task,
                    normalize_domain(&task.url),
                    now_local.clone(),
                    SKIP_REASON,
                )
            })
        })
        .collect();

    write_reports(run_dir.path(), &batch.results)?;
    let summary = batch.summary();
    write_final_summary(&run_dir, input, &summary, batch.aborted.as_deref())?;

    emitter.emit(ProgressEventKind::BatchFinished {
        total: summary.total,
        completed: summary.completed,
        navigation_failures: summary.navigation_failures,
        capture_failures: summary.capture_failures,
        elapsed_ms: clock.elapsed().as_millis() as u64,
    });
    info!(
        "batch finished: {} completed, {} navigation failure(s), {} capture failure(s), {} skipped",
        summary.completed, summary.navigation_failures, summary.capture_failures, summary.skipped
    );

    Ok(batch)
}

/// Process every task, storing each result in its task's slot.
///
/// The first lost session stops new tasks from starting, but tasks already
/// in flight are drained and keep their results. Slots left empty belong to
/// tasks that never ran or died with the session.
#[allow(clippy::too_many_arguments)]
async fn execute(
    tasks: &[ExtractionTask],
    slots: &mut [Option<ResourceResult>],
    renderer: &dyn Renderer,
    rules: &RuleBook,
    config: &CaptureConfig,
    run_dir: &RunDirectory,
    emitter: &ProgressEmitter,
    audit: &mut AuditLogger,
) -> Result<(), BatchError> {
    let workers = config.workers.clamp(1, tasks.len().max(1));
    let mut contexts = Vec::with_capacity(workers);
    for _ in 0..workers {
        match renderer.new_context().await {
            Ok(ctx) => contexts.push(ctx),
            Err(e) if contexts.is_empty() || e.is_fatal() => {
                for ctx in contexts {
                    let _ = ctx.close().await;
                }
                return Err(BatchError::session_lost(&e));
            }
            Err(e) => {
                let message = format!("could not open extra tab, continuing with {}: {e}", contexts.len());
                warn!("{message}");
                emitter.emit(ProgressEventKind::Warning { message });
                break;
            }
        }
    }
    let workers = contexts.len();
    let pool = ContextPool::new(contexts);
    let orchestrator = Orchestrator::new(rules, config, run_dir);
    let halted = AtomicBool::new(false);

    let outcome = {
        let pool = &pool;
        let orchestrator = &orchestrator;
        let halted = &halted;
        let results = futures::stream::iter(tasks.iter().enumerate())
            .map(|(index, task)| async move {
                if halted.load(Ordering::SeqCst) {
                    return (index, None, 0);
                }
                let Some(mut ctx) = pool.acquire().await else {
                    halted.store(true, Ordering::SeqCst);
                    let lost = BatchError::SessionLost("no browser tab available".into());
                    return (index, Some(Err(lost)), 0);
                };
                if halted.load(Ordering::SeqCst) {
                    pool.release(ctx);
                    return (index, None, 0);
                }
                emitter.emit(ProgressEventKind::TaskStarted {
                    index,
                    url: task.url.clone(),
                });
                let start = Instant::now();
                let result = orchestrator.process_task(ctx.as_mut(), task).await;
                if result.is_err() {
                    halted.store(true, Ordering::SeqCst);
                }
                pool.release(ctx);
                (index, Some(result), start.elapsed().as_millis() as u64)
            })
            .buffered(workers);
        futures::pin_mut!(results);

        let mut first_error = None;
        while let Some((index, result, duration_ms)) = results.next().await {
            match result {
                Some(Ok(result)) => {
                    emitter.emit(ProgressEventKind::TaskFinished {
                        index,
                        url: result.url.clone(),
                        status: result.status(),
                        duration_ms,
                    });
                    if let Err(e) = audit.log(&AuditEvent::from_result(index, &result, duration_ms)) {
                        warn!("task log write failed: {e:#}");
                    }
                    slots[index] = Some(result);
                }
                Some(Err(e)) => {
                    warn!("task {index} ({}) aborted: {e}", tasks[index].url);
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                None => debug!("task {index} not started"),
            }
        }
        first_error.map_or(Ok(()), Err)
    };

    pool.close_all().await;
    outcome
}

fn write_final_summary(
    run_dir: &RunDirectory,
    input: &Path,
    summary: &BatchSummary,
    aborted: Option<&str>,
) -> std::io::Result<()> {
    let mut text = format!(
        "input: {}\ntotal_tasks: {}\ncompleted: {}\nnavigation_failures: {}\ncapture_failures: {}\nskipped: {}\n",
        input.display(),
        summary.total,
        summary.completed,
        summary.navigation_failures,
        summary.capture_failures,
        summary.skipped,
    );
    if let Some(reason) = aborted {
        text.push_str(&format!("aborted: {reason}\n"));
    }
    std::fs::write(run_dir.join(super::artifacts::RUN_SUMMARY_FILE), text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{Field, FieldExtractionResult, SourceTier};
    use std::collections::BTreeMap;

    fn result_with(status: TaskStatus) -> ResourceResult {
        let mut fields = BTreeMap::new();
        fields.insert(
            Field::Price,
            FieldExtractionResult::new(Field::Price, "12,50".into(), SourceTier::Selector),
        );
        ResourceResult {
            domain: "a.example".into(),
            url: "https://a.example".into(),
            captured_at_local: "2026-10-19T12:00:00+00:00".into(),
            fields,
            screenshot_path: None,
            navigation_error: None,
            capture_error: None,
            status,
        }
    }

    #[test]
    fn test_summary_counts() {
        let results = vec![
            result_with(TaskStatus::Completed),
            result_with(TaskStatus::Completed),
            result_with(TaskStatus::CaptureFailed),
            result_with(TaskStatus::NavigationFailed),
            result_with(TaskStatus::Skipped),
        ];
        let summary = BatchSummary::from_results(&results);
        assert_eq!(
            summary,
            BatchSummary {
                total: 5,
                completed: 2,
                navigation_failures: 1,
                capture_failures: 1,
                skipped: 1,
            }
        );
    }

    #[test]
    fn test_run_id_format() {
        let at = DateTime::parse_from_rfc3339("2026-10-19T08:05:09Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(at.format(RUN_ID_FORMAT).to_string(), "20261019_080509");
    }
}
