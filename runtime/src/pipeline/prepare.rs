//! Page preparation: navigate, dismiss a consent overlay, let the page settle.

use super::BatchError;
use crate::config::CaptureConfig;
use crate::renderer::{Locator, NavigationResult, RenderContext};
use std::time::Duration;
use tracing::{debug, warn};

/// Common "accept" controls of cookie/consent overlays, tried in order.
pub const CONSENT_LOCATORS: &[&str] = &[
    "button:has-text('Accept')",
    "button:has-text('Accetta')",
    "button:has-text('I agree')",
    "[id*='onetrust-accept']",
    "[aria-label*='accept']",
    "[data-testid*='accept']",
];

/// Outcome of preparing one page.
#[derive(Debug, Clone)]
pub enum PrepareOutcome {
    /// The DOM is up, the overlay is handled and the settle delay has passed.
    Ready(NavigationResult),
    /// The page could not be reached; carries the underlying reason.
    NavigationFailed(String),
}

/// Navigate `ctx` to `url` and get it ready for extraction.
///
/// Navigation waits for DOM construction only, not network idle: pages with
/// background polling never go idle. A navigation failure is returned as an
/// outcome; only a lost browser session is an error.
pub async fn prepare(
    ctx: &mut dyn RenderContext,
    url: &str,
    config: &CaptureConfig,
) -> Result<PrepareOutcome, BatchError> {
    let nav = match ctx.navigate(url, config.nav_timeout).await {
        Ok(nav) => nav,
        Err(e) if e.is_fatal() => return Err(BatchError::session_lost(&e)),
        Err(e) => {
            warn!("navigation to {url} failed: {e}");
            return Ok(PrepareOutcome::NavigationFailed(e.to_string()));
        }
    };
    debug!("{url} DOM ready in {}ms", nav.load_time_ms);

    dismiss_consent(&*ctx, config.consent_wait).await;

    if !config.settle_delay.is_zero() {
        tokio::time::sleep(config.settle_delay).await;
    }
    Ok(PrepareOutcome::Ready(nav))
}

/// Click the first visible consent control. Best-effort: absence, failures
/// and unclickable overlays are all ignored. Returns the locator clicked.
pub async fn dismiss_consent(ctx: &dyn RenderContext, wait: Duration) -> Option<&'static str> {
    for raw in CONSENT_LOCATORS {
        match ctx.click_visible(&Locator::parse(raw), wait).await {
            Ok(true) => {
                debug!("dismissed consent overlay via {raw}");
                return Some(*raw);
            }
            Ok(false) => {}
            Err(e) => debug!("consent locator {raw} failed: {e}"),
        }
    }
    None
}
