//! Ordered selector cascade against the live page.
//!
//! Site markup for a field usually has a handful of plausible locators that
//! come and go with redesigns and A/B tests. The cascade tries them in
//! priority order and keeps the first non-empty visible text. A locator that
//! errors (bad syntax, detached node, slow lookup) counts as "no match"; the
//! cascade itself never fails.

use crate::renderer::{Locator, RenderContext};
use std::time::Duration;
use tracing::debug;

/// First non-empty visible text among `candidates`, trimmed; empty string
/// when every candidate is exhausted.
pub async fn extract_text(
    ctx: &dyn RenderContext,
    candidates: &[Locator],
    wait_budget: Duration,
) -> String {
    for locator in candidates {
        if locator.is_empty() {
            continue;
        }
        match ctx.visible_text(locator, wait_budget).await {
            Ok(Some(text)) => {
                let text = text.trim();
                if !text.is_empty() {
                    debug!("locator {locator} matched");
                    return text.to_string();
                }
                debug!("locator {locator} visible but empty");
            }
            Ok(None) => debug!("locator {locator} not visible"),
            Err(e) => debug!("locator {locator} failed: {e}"),
        }
    }
    String::new()
}
