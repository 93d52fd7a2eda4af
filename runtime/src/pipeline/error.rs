//! Batch-level error taxonomy.
//!
//! Task-scoped failures (navigation, capture) never appear here: the
//! orchestrator turns them into artifacts and result fields. What remains is
//! the loss of the browser session and failures writing the run's outputs.

use crate::renderer::RenderError;

#[derive(thiserror::Error, Debug)]
pub enum BatchError {
    /// The browser session is unusable; the batch cannot continue.
    #[error("browser session lost: {0}")]
    SessionLost(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BatchError {
    /// Convert a render error that is known to be fatal.
    pub fn session_lost(err: &RenderError) -> Self {
        match err {
            RenderError::SessionLost(msg) => Self::SessionLost(msg.clone()),
            other => Self::SessionLost(other.to_string()),
        }
    }
}
