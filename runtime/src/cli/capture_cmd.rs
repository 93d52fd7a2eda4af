//! `quoteshot capture --input <file> --out <dir>` — run one batch.

use crate::cli::output::{self, Styled};
use crate::config::{parse_timezone, CaptureConfig, ViewportSize};
use crate::extract::rules::RuleBook;
use crate::manifest;
use crate::pipeline::batch;
use crate::progress::{self, ProgressEventKind, ProgressReceiver, TaskStatus};
use crate::renderer::chromium::ChromiumRenderer;
use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

/// Raw flag values for the capture command.
#[derive(Debug, Clone)]
pub struct CaptureArgs {
    pub input: PathBuf,
    pub out: PathBuf,
    pub viewport: String,
    pub delay_ms: u64,
    pub timeout_ms: u64,
    pub selector_wait_ms: u64,
    pub consent_wait_ms: u64,
    pub tz: String,
    pub rules: Option<PathBuf>,
    pub workers: usize,
    pub chromium_path: Option<PathBuf>,
    pub body_scan_limit: usize,
}

impl CaptureArgs {
    /// Turn flag values into a validated configuration.
    pub fn to_config(&self) -> Result<CaptureConfig> {
        let viewport: ViewportSize = self.viewport.parse()?;
        let config = CaptureConfig {
            viewport,
            settle_delay: Duration::from_millis(self.delay_ms),
            nav_timeout: Duration::from_millis(self.timeout_ms),
            selector_wait: Duration::from_millis(self.selector_wait_ms),
            consent_wait: Duration::from_millis(self.consent_wait_ms),
            timezone: parse_timezone(&self.tz)?,
            body_scan_limit: self.body_scan_limit,
            workers: self.workers,
            rules_path: self.rules.clone(),
            chromium_path: self.chromium_path.clone(),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Run the capture command.
pub async fn run(args: &CaptureArgs) -> Result<()> {
    let config = args.to_config()?;
    let rules = RuleBook::load(config.rules_path.as_deref())?;
    let tasks = manifest::load(&args.input)?;

    let (tx, rx) = progress::channel();
    let listener = if output::is_quiet() || output::is_json() {
        drop(rx);
        None
    } else {
        Some(tokio::spawn(show_progress(rx)))
    };

    let launch_options = config.launch_options();
    let outcome = batch::run(
        &args.input,
        tasks,
        &args.out,
        &config,
        &rules,
        Some(tx),
        || async move { ChromiumRenderer::launch(&launch_options).await },
    )
    .await;

    if let Some(handle) = listener {
        let _ = handle.await;
    }
    let run = outcome.context("batch run failed")?;
    let summary = run.summary();

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "output_directory": run.output_directory,
            "total": summary.total,
            "completed": summary.completed,
            "navigation_failures": summary.navigation_failures,
            "capture_failures": summary.capture_failures,
            "skipped": summary.skipped,
            "aborted": run.aborted,
        }));
    } else if !output::is_quiet() {
        print_summary(&run.output_directory, &summary, run.is_empty());
    }

    if let Some(reason) = &run.aborted {
        bail!("browser session lost: {reason}");
    }
    Ok(())
}

fn print_summary(dir: &Path, summary: &batch::BatchSummary, empty: bool) {
    let s = Styled::new();
    eprintln!();
    if empty {
        eprintln!("  {} No URLs found in input", s.warn_sym());
    } else {
        eprintln!(
            "  {} {} of {} captured",
            s.ok_sym(),
            summary.completed,
            summary.total
        );
        if summary.navigation_failures > 0 {
            eprintln!(
                "  {} {} navigation failure(s)",
                s.warn_sym(),
                summary.navigation_failures
            );
        }
        if summary.capture_failures > 0 {
            eprintln!(
                "  {} {} screenshot failure(s)",
                s.warn_sym(),
                summary.capture_failures
            );
        }
        if summary.skipped > 0 {
            eprintln!("  {} {} skipped", s.fail_sym(), summary.skipped);
        }
    }
    eprintln!("  {} {}", s.dim("Output:"), dir.display());
}

/// Drive a progress bar from the run's events until the batch finishes.
async fn show_progress(mut rx: ProgressReceiver) {
    let pb = ProgressBar::hidden();
    loop {
        match rx.recv().await {
            Ok(event) => match event.event {
                ProgressEventKind::BatchStarted { total } => {
                    pb.set_length(total as u64);
                    pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
                    if let Ok(style) = ProgressStyle::default_bar()
                        .template("{spinner:.green} [{bar:40.green/dim}] {pos}/{len} {msg}")
                    {
                        pb.set_style(style.progress_chars("█▓░"));
                    }
                    pb.enable_steady_tick(Duration::from_millis(120));
                }
                ProgressEventKind::TaskStarted { url, .. } => pb.set_message(url),
                ProgressEventKind::TaskFinished { url, status, .. } => {
                    if status != TaskStatus::Completed {
                        pb.println(format!("  {status}: {url}"));
                    }
                    pb.inc(1);
                }
                ProgressEventKind::Warning { message } => pb.println(format!("  {message}")),
                ProgressEventKind::BatchFinished { .. } => break,
            },
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        }
    }
    pb.finish_and_clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> CaptureArgs {
        CaptureArgs {
            input: PathBuf::from("urls.txt"),
            out: PathBuf::from("out"),
            viewport: "1280x720".into(),
            delay_ms: 0,
            timeout_ms: 1000,
            selector_wait_ms: 200,
            consent_wait_ms: 0,
            tz: "Europe/Rome".into(),
            rules: None,
            workers: 2,
            chromium_path: None,
            body_scan_limit: 1000,
        }
    }

    #[test]
    fn test_args_to_config() {
        let config = args().to_config().unwrap();
        assert_eq!(config.viewport.to_string(), "1280x720");
        assert_eq!(config.nav_timeout, Duration::from_millis(1000));
        assert_eq!(config.timezone, chrono_tz::Tz::Europe__Rome);
        assert_eq!(config.workers, 2);
    }

    #[test]
    fn test_bad_flags_rejected() {
        let mut bad = args();
        bad.viewport = "huge".into();
        assert!(bad.to_config().is_err());

        let mut bad = args();
        bad.tz = "Nowhere/Special".into();
        assert!(bad.to_config().is_err());

        let mut bad = args();
        bad.workers = 0;
        assert!(bad.to_config().is_err());
    }
}
