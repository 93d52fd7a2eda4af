// Copyright 2026 Quoteshot Contributors
// SPDX-License-Identifier: Apache-2.0

//! Progress event types and broadcast channel for batch telemetry.
//!
//! The batch driver emits `ProgressEvent`s as tasks start and finish. They
//! flow through a `tokio::sync::broadcast` channel to every subscriber (the
//! CLI progress bar, tests). When no subscriber exists, events are silently
//! dropped.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A progress event emitted during a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// The run this event belongs to (its output directory name).
    pub run_id: String,
    /// Monotonically increasing sequence number.
    pub seq: u64,
    /// The kind of progress event.
    pub event: ProgressEventKind,
}

/// The specific kind of progress event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEventKind {
    /// The batch is about to start.
    BatchStarted { total: usize },
    /// A task left the queue.
    TaskStarted { index: usize, url: String },
    /// A task produced its result.
    TaskFinished {
        index: usize,
        url: String,
        status: TaskStatus,
        duration_ms: u64,
    },
    /// Every task has a result (or the batch was aborted).
    BatchFinished {
        total: usize,
        completed: usize,
        navigation_failures: usize,
        capture_failures: usize,
        elapsed_ms: u64,
    },
    /// A non-fatal warning occurred.
    Warning { message: String },
}

/// How a task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Fields extracted and screenshot written.
    Completed,
    /// Fields extracted, screenshot failed.
    CaptureFailed,
    /// The page could not be reached.
    NavigationFailed,
    /// Never attempted because the browser session was lost.
    Skipped,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::CaptureFailed => write!(f, "capture failed"),
            Self::NavigationFailed => write!(f, "navigation failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Sender handle for emitting progress events.
///
/// Backed by a `tokio::sync::broadcast` channel so multiple listeners can
/// subscribe independently. When no listeners exist, `send()` returns an error
/// which we silently ignore.
pub type ProgressSender = tokio::sync::broadcast::Sender<ProgressEvent>;

/// Receiver handle for consuming progress events.
pub type ProgressReceiver = tokio::sync::broadcast::Receiver<ProgressEvent>;

/// Create a new progress broadcast channel with a bounded buffer.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::broadcast::channel(256)
}

/// Emits events for one run, numbering them as it goes.
#[derive(Debug)]
pub struct ProgressEmitter {
    tx: Option<ProgressSender>,
    run_id: String,
    seq: std::sync::atomic::AtomicU64,
}

impl ProgressEmitter {
    pub fn new(tx: Option<ProgressSender>, run_id: impl Into<String>) -> Self {
        Self {
            tx,
            run_id: run_id.into(),
            seq: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Emit an event, ignoring send errors (no receivers listening).
    pub fn emit(&self, event: ProgressEventKind) {
        if let Some(ref sender) = self.tx {
            let seq = self
                .seq
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
                + 1;
            let _ = sender.send(ProgressEvent {
                run_id: self.run_id.clone(),
                seq,
                event,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_event_serialization() {
        let event = ProgressEvent {
            run_id: "20261019_120000".to_string(),
            seq: 1,
            event: ProgressEventKind::TaskFinished {
                index: 3,
                url: "https://a.example".to_string(),
                status: TaskStatus::CaptureFailed,
                duration_ms: 1200,
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("TaskFinished"));
        assert!(json.contains("capture_failed"));

        let parsed: ProgressEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.run_id, "20261019_120000");
        assert_eq!(parsed.seq, 1);
    }

    #[test]
    fn test_emitter_numbers_events() {
        let (tx, mut rx) = channel();
        let emitter = ProgressEmitter::new(Some(tx), "run");
        emitter.emit(ProgressEventKind::BatchStarted { total: 2 });
        emitter.emit(ProgressEventKind::Warning {
            message: "slow page".to_string(),
        });
        assert_eq!(rx.try_recv().unwrap().seq, 1);
        assert_eq!(rx.try_recv().unwrap().seq, 2);
    }

    #[test]
    fn test_channel_no_receivers() {
        let (tx, rx) = channel();
        drop(rx); // No receivers
        ProgressEmitter::new(Some(tx), "run").emit(ProgressEventKind::Warning {
            message: "test".to_string(),
        });
    }

    #[test]
    fn test_emit_none_sender() {
        ProgressEmitter::new(None, "run").emit(ProgressEventKind::BatchStarted { total: 0 });
    }

    #[test]
    fn test_task_status_display() {
        assert_eq!(TaskStatus::NavigationFailed.to_string(), "navigation failed");
        assert_eq!(TaskStatus::Completed.to_string(), "completed");
    }
}
