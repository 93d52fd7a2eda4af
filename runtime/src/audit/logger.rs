//! JSONL task log — one line per processed task.
//!
//! Written next to the run's other artifacts as `run_log.jsonl`, in task
//! order, so a run can be audited (which tier produced each field, how long
//! each page took) without re-opening the screenshots.

use crate::extract::{Field, SourceTier};
use crate::pipeline::ResourceResult;
use crate::progress::TaskStatus;
use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// File name of the task log inside a run directory.
pub const TASK_LOG_FILE: &str = "run_log.jsonl";

/// A single audit event.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub index: usize,
    pub url: String,
    pub domain: String,
    pub status: TaskStatus,
    pub duration_ms: u64,
    pub tiers: BTreeMap<Field, SourceTier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditEvent {
    /// Summarize a finished task.
    pub fn from_result(index: usize, result: &ResourceResult, duration_ms: u64) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            index,
            url: result.url.clone(),
            domain: result.domain.clone(),
            status: result.status(),
            duration_ms,
            tiers: result
                .fields
                .iter()
                .map(|(field, r)| (*field, r.source_tier))
                .collect(),
            error: result
                .navigation_error
                .clone()
                .or_else(|| result.capture_error.clone()),
        }
    }
}

/// Append-only JSONL audit logger.
pub struct AuditLogger {
    file: File,
    path: PathBuf,
}

impl AuditLogger {
    /// Open or create the task log inside `run_dir`.
    pub fn open(run_dir: &Path) -> Result<Self> {
        let path = run_dir.join(TASK_LOG_FILE);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open task log: {}", path.display()))?;
        Ok(Self { file, path })
    }

    /// Log an audit event.
    pub fn log(&mut self, event: &AuditEvent) -> Result<()> {
        let json = serde_json::to_string(event)?;
        writeln!(self.file, "{json}")
            .with_context(|| format!("failed to append to {}", self.path.display()))?;
        Ok(())
    }
}
