//! Chromium-based renderer using chromiumoxide.

use super::{truncate_chars, Locator, NavigationResult, RenderContext, RenderError, Renderer};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, NavigateParams};
use chromiumoxide::error::CdpError;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Interval between visibility checks while waiting on a locator.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Interval between `document.readyState` polls after navigation commits.
const READY_STATE_INTERVAL: Duration = Duration::from_millis(50);

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. QUOTESHOT_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("QUOTESHOT_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.quoteshot/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".quoteshot/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".quoteshot/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".quoteshot/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".quoteshot/chromium/chrome-linux64/chrome"),
                home.join(".quoteshot/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Options for launching the headless browser.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Explicit executable; falls back to [`find_chromium`] and then to
    /// chromiumoxide's own detection.
    pub chromium_path: Option<PathBuf>,
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    browser: Mutex<Browser>,
    handler_task: std::sync::Mutex<Option<JoinHandle<()>>>,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Launch a headless Chromium instance.
    pub async fn launch(options: &LaunchOptions) -> Result<Self, RenderError> {
        let mut builder = BrowserConfig::builder()
            .window_size(options.viewport_width, options.viewport_height)
            .viewport(Viewport {
                width: options.viewport_width,
                height: options.viewport_height,
                ..Viewport::default()
            })
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");

        if let Some(path) = options.chromium_path.clone().or_else(find_chromium) {
            debug!("using Chromium at {}", path.display());
            builder = builder.chrome_executable(path);
        }

        let config = builder
            .build()
            .map_err(|e| RenderError::SessionLost(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::SessionLost(format!("failed to launch Chromium: {e}")))?;

        // Spawn the handler task
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        info!(
            "Chromium launched ({}x{})",
            options.viewport_width, options.viewport_height
        );

        Ok(Self {
            browser: Mutex::new(browser),
            handler_task: std::sync::Mutex::new(Some(handler_task)),
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>, RenderError> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(|e| classify(e, RenderError::SessionLost))?;

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumContext {
            page,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> Result<(), RenderError> {
        let mut browser = self.browser.lock().await;
        let closed = browser.close().await;
        let _ = browser.wait().await;

        if let Ok(mut task) = self.handler_task.lock() {
            if let Some(task) = task.take() {
                task.abort();
            }
        }

        closed
            .map(|_| ())
            .map_err(|e| RenderError::SessionLost(format!("failed to close browser: {e}")))
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// A single Chromium page context.
pub struct ChromiumContext {
    page: Page,
    active_count: Arc<AtomicUsize>,
}

/// What the in-page lookup reports about a locator.
#[derive(Debug, Deserialize)]
struct LocatorState {
    found: bool,
    visible: bool,
    #[serde(default)]
    text: String,
}

impl ChromiumContext {
    async fn evaluate_string(&self, script: String) -> Result<String, RenderError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| classify(e, RenderError::Script))?;
        result
            .into_value::<String>()
            .map_err(|e| RenderError::Script(format!("unexpected script result: {e}")))
    }

    async fn inspect(&self, locator: &Locator, click: bool) -> Result<LocatorState, RenderError> {
        let json = self.evaluate_string(locator_script(locator, click)).await?;
        serde_json::from_str(&json)
            .map_err(|e| RenderError::Script(format!("malformed locator result: {e}")))
    }

    /// Poll until a visible match exists or `wait` elapses.
    async fn wait_visible(
        &self,
        locator: &Locator,
        wait: Duration,
        click: bool,
    ) -> Result<Option<LocatorState>, RenderError> {
        let start = Instant::now();
        loop {
            let state = self.inspect(locator, click).await?;
            if state.found && state.visible {
                return Ok(Some(state));
            }
            if start.elapsed() >= wait {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_for_dom(&self) -> Result<(), RenderError> {
        loop {
            match self
                .evaluate_string("document.readyState".to_string())
                .await
            {
                Ok(state) if state == "interactive" || state == "complete" => return Ok(()),
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(e),
                // Execution context may be swapped mid-navigation.
                Err(e) => debug!("readyState check failed: {e}"),
            }
            tokio::time::sleep(READY_STATE_INTERVAL).await;
        }
    }
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(
        &mut self,
        url: &str,
        timeout: Duration,
    ) -> Result<NavigationResult, RenderError> {
        let start = Instant::now();

        let navigation = async {
            let response = self
                .page
                .execute(NavigateParams::new(url))
                .await
                .map_err(|e| classify(e, RenderError::Navigation))?;
            if let Some(error_text) = response.result.error_text.as_ref() {
                return Err(RenderError::Navigation(format!("{error_text} at {url}")));
            }
            self.wait_for_dom().await
        };

        match tokio::time::timeout(timeout, navigation).await {
            Ok(Ok(())) => {
                let final_url = self
                    .page
                    .url()
                    .await
                    .ok()
                    .flatten()
                    .unwrap_or_else(|| url.to_string());
                Ok(NavigationResult {
                    final_url,
                    load_time_ms: start.elapsed().as_millis() as u64,
                })
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(RenderError::Timeout {
                operation: "navigation",
                after: timeout,
            }),
        }
    }

    async fn visible_text(
        &self,
        locator: &Locator,
        wait: Duration,
    ) -> Result<Option<String>, RenderError> {
        Ok(self
            .wait_visible(locator, wait, false)
            .await?
            .map(|state| state.text))
    }

    async fn click_visible(&self, locator: &Locator, wait: Duration) -> Result<bool, RenderError> {
        Ok(self.wait_visible(locator, wait, true).await?.is_some())
    }

    async fn body_text(&self, max_chars: usize) -> Result<String, RenderError> {
        let script = format!(
            "(document.body ? document.body.innerText : '').slice(0, {max_chars})"
        );
        let text = self.evaluate_string(script).await?;
        Ok(truncate_chars(&text, max_chars).to_string())
    }

    async fn screenshot_full_page(&self, timeout: Duration) -> Result<Vec<u8>, RenderError> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();

        match tokio::time::timeout(timeout, self.page.screenshot(params)).await {
            Ok(result) => result.map_err(|e| classify(e, RenderError::Capture)),
            Err(_) => Err(RenderError::Timeout {
                operation: "screenshot",
                after: timeout,
            }),
        }
    }

    async fn close(self: Box<Self>) -> Result<(), RenderError> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        let _ = self.page.close().await;
        Ok(())
    }
}

/// Map a CDP error onto the render taxonomy. Transport failures mean the
/// browser is gone; anything else is reported through `scoped`.
fn classify(err: CdpError, scoped: fn(String) -> RenderError) -> RenderError {
    match &err {
        CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse => {
            RenderError::SessionLost(err.to_string())
        }
        _ => scoped(err.to_string()),
    }
}

/// Build the in-page lookup for `locator`. The script returns a JSON string
/// `{found, visible, text}` for the first element matching the CSS part (and
/// the text filter, when present). With `click`, a visible match is clicked.
fn locator_script(locator: &Locator, click: bool) -> String {
    let css = serde_json::Value::from(locator.css()).to_string();
    let needle = match locator.has_text() {
        Some(text) => serde_json::Value::from(text).to_string(),
        None => "null".to_string(),
    };
    format!(
        r#"(() => {{
  const nodes = Array.from(document.querySelectorAll({css}));
  const needle = {needle};
  const textOf = (n) => (n.innerText || n.textContent || '');
  const el = needle === null ? nodes[0] : nodes.find((n) => textOf(n).includes(needle));
  if (!el) return JSON.stringify({{ found: false, visible: false, text: '' }});
  const rect = el.getBoundingClientRect();
  const style = window.getComputedStyle(el);
  const visible = rect.width > 0 && rect.height > 0
    && style.visibility !== 'hidden' && style.display !== 'none';
  if (visible && {click}) el.click();
  return JSON.stringify({{ found: true, visible, text: visible ? textOf(el) : '' }});
}})()"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_script_escapes_selector() {
        let script = locator_script(&Locator::parse(r#"[data-test="price"]"#), false);
        assert!(script.contains(r#"document.querySelectorAll("[data-test=\"price\"]")"#));
        assert!(script.contains("const needle = null;"));
        assert!(script.contains("if (visible && false) el.click();"));
    }

    #[test]
    fn test_locator_script_has_text() {
        let script = locator_script(&Locator::parse("button:has-text('Accetta')"), true);
        assert!(script.contains(r#"querySelectorAll("button")"#));
        assert!(script.contains(r#"const needle = "Accetta";"#));
        assert!(script.contains("if (visible && true) el.click();"));
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_lookup_and_screenshot() {
        let renderer = ChromiumRenderer::launch(&LaunchOptions {
            viewport_width: 800,
            viewport_height: 600,
            chromium_path: None,
        })
        .await
        .expect("failed to launch renderer");
        let mut ctx = renderer
            .new_context()
            .await
            .expect("failed to create context");

        ctx.navigate(
            "data:text/html,<h1>Quote</h1><span class='p'> 12,50 </span><span hidden class='h'>x</span>",
            Duration::from_secs(10),
        )
        .await
        .expect("navigation failed");

        let text = ctx
            .visible_text(&Locator::parse("span.p"), Duration::from_millis(500))
            .await
            .expect("lookup failed");
        assert_eq!(text.as_deref().map(str::trim), Some("12,50"));

        let hidden = ctx
            .visible_text(&Locator::parse("span.h"), Duration::from_millis(200))
            .await
            .expect("lookup failed");
        assert!(hidden.is_none());

        let png = ctx
            .screenshot_full_page(Duration::from_secs(10))
            .await
            .expect("screenshot failed");
        assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));

        ctx.close().await.expect("close failed");
        assert_eq!(renderer.active_contexts(), 0);
        renderer.shutdown().await.expect("shutdown failed");
    }
}
