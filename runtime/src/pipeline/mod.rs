//! Batch capture pipeline.
//!
//! Per task: `PENDING → NAVIGATING → (NAV_FAILED | READY) → EXTRACTING →
//! CAPTURING → DONE`. Navigation failure is terminal for the task but not for
//! the batch; only loss of the browser session stops the run, and even then
//! every task still gets a result and the outputs are flushed.

pub mod artifacts;
pub mod batch;
pub mod error;
pub mod orchestrator;
pub mod prepare;
pub mod report;

pub use batch::{BatchRun, BatchSummary};
pub use error::BatchError;

use crate::extract::{Field, FieldExtractionResult};
use crate::manifest::ExtractionTask;
use crate::progress::TaskStatus;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Everything captured for one task. Exactly one per input task, in input
/// order.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceResult {
    pub domain: String,
    pub url: String,
    /// RFC 3339 timestamp in the configured zone.
    pub captured_at_local: String,
    /// Empty when navigation failed; otherwise one entry per [`Field`].
    pub fields: BTreeMap<Field, FieldExtractionResult>,
    pub screenshot_path: Option<PathBuf>,
    pub navigation_error: Option<String>,
    pub capture_error: Option<String>,
    pub status: TaskStatus,
}

impl ResourceResult {
    /// Result for a task whose page could not be reached.
    pub fn navigation_failed(
        task: &ExtractionTask,
        domain: String,
        captured_at_local: String,
        reason: String,
    ) -> Self {
        Self {
            domain,
            url: task.url.clone(),
            captured_at_local,
            fields: BTreeMap::new(),
            screenshot_path: None,
            navigation_error: Some(reason),
            capture_error: None,
            status: TaskStatus::NavigationFailed,
        }
    }

    /// Result for a task that was never attempted because the session died.
    pub fn skipped(
        task: &ExtractionTask,
        domain: String,
        captured_at_local: String,
        reason: &str,
    ) -> Self {
        Self {
            status: TaskStatus::Skipped,
            navigation_error: Some(format!("skipped: {reason}")),
            ..Self::navigation_failed(task, domain, captured_at_local, String::new())
        }
    }

    /// Normalized value of `field`, empty when missing.
    pub fn value(&self, field: Field) -> &str {
        self.fields
            .get(&field)
            .map(|r| r.normalized_value.as_str())
            .unwrap_or("")
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }
}
