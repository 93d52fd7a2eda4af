//! Renderer abstraction for browser-based page capture.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide). The extraction
//! pipeline only ever talks to these traits, so it can be driven by a
//! scripted context in tests.

pub mod chromium;
pub mod locator;

pub use locator::Locator;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The URL the tab ended up on.
    pub final_url: String,
    /// Time until the DOM was constructed, in milliseconds.
    pub load_time_ms: u64,
}

/// Errors raised by a render context.
#[derive(thiserror::Error, Debug, Clone)]
pub enum RenderError {
    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("{operation} timed out after {}ms", .after.as_millis())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("script error: {0}")]
    Script(String),

    #[error("screenshot failed: {0}")]
    Capture(String),

    #[error("browser session lost: {0}")]
    SessionLost(String),
}

impl RenderError {
    /// Whether the underlying browser session is gone. Every other error is
    /// scoped to the operation that raised it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SessionLost(_))
    }
}

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>, RenderError>;
    /// Shut down the browser engine and release the child process.
    async fn shutdown(&self) -> Result<(), RenderError>;
    /// Number of currently active contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser context (tab).
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL, waiting only for DOM construction, bounded by `timeout`.
    async fn navigate(&mut self, url: &str, timeout: Duration)
        -> Result<NavigationResult, RenderError>;

    /// Wait up to `wait` for the first element matching `locator` to become
    /// visible and return its rendered text (untrimmed). `Ok(None)` means
    /// nothing visible matched within the budget.
    async fn visible_text(
        &self,
        locator: &Locator,
        wait: Duration,
    ) -> Result<Option<String>, RenderError>;

    /// Wait up to `wait` for a visible match and click it. Returns whether a
    /// click was dispatched.
    async fn click_visible(&self, locator: &Locator, wait: Duration) -> Result<bool, RenderError>;

    /// Rendered text of the document body, truncated to `max_chars` characters.
    async fn body_text(&self, max_chars: usize) -> Result<String, RenderError>;

    /// Capture a full-page PNG screenshot.
    async fn screenshot_full_page(&self, timeout: Duration) -> Result<Vec<u8>, RenderError>;

    /// Close this context.
    async fn close(self: Box<Self>) -> Result<(), RenderError>;
}

/// Truncate `text` to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
