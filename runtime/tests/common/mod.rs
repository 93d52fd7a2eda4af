//! Scripted in-memory renderer used by the integration tests.
//!
//! Pages are keyed by URL. Each page declares what every locator does
//! (visible text, hidden, error), its body text, and whether navigation or
//! the screenshot fails. No browser is involved.

#![allow(dead_code)]

use async_trait::async_trait;
use quoteshot::config::CaptureConfig;
use quoteshot::renderer::{
    truncate_chars, Locator, NavigationResult, RenderContext, RenderError, Renderer,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What looking up a locator yields.
#[derive(Debug, Clone)]
pub enum LocatorScript {
    Text(String),
    Hidden,
    Error,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedPage {
    pub locators: HashMap<String, LocatorScript>,
    pub body: String,
    pub nav_error: Option<RenderError>,
    pub screenshot_error: Option<RenderError>,
    pub consent: Option<String>,
    pub nav_delay: Duration,
}

impl ScriptedPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, locator: &str, text: &str) -> Self {
        self.locators
            .insert(locator.to_string(), LocatorScript::Text(text.to_string()));
        self
    }

    pub fn hidden(mut self, locator: &str) -> Self {
        self.locators.insert(locator.to_string(), LocatorScript::Hidden);
        self
    }

    pub fn broken(mut self, locator: &str) -> Self {
        self.locators.insert(locator.to_string(), LocatorScript::Error);
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    pub fn nav_error(mut self, err: RenderError) -> Self {
        self.nav_error = Some(err);
        self
    }

    pub fn screenshot_error(mut self, err: RenderError) -> Self {
        self.screenshot_error = Some(err);
        self
    }

    pub fn consent(mut self, locator: &str) -> Self {
        self.consent = Some(locator.to_string());
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.nav_delay = delay;
        self
    }
}

/// Everything the tests may want to assert on after a run.
#[derive(Debug, Default)]
pub struct Recorder {
    pub visited: Mutex<Vec<String>>,
    pub clicks: Mutex<Vec<String>>,
    pub body_reads: AtomicUsize,
    pub contexts_opened: AtomicUsize,
    pub contexts_closed: AtomicUsize,
    pub shut_down: AtomicBool,
    pub dead: AtomicBool,
}

#[derive(Clone, Default)]
pub struct ScriptedRenderer {
    pages: Arc<HashMap<String, ScriptedPage>>,
    pub recorder: Arc<Recorder>,
}

impl ScriptedRenderer {
    pub fn new(pages: Vec<(&str, ScriptedPage)>) -> Self {
        Self {
            pages: Arc::new(
                pages
                    .into_iter()
                    .map(|(url, page)| (url.to_string(), page))
                    .collect(),
            ),
            recorder: Arc::new(Recorder::default()),
        }
    }
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>, RenderError> {
        if self.recorder.dead.load(Ordering::SeqCst) {
            return Err(RenderError::SessionLost("browser gone".into()));
        }
        self.recorder.contexts_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedContext {
            pages: Arc::clone(&self.pages),
            recorder: Arc::clone(&self.recorder),
            current: None,
        }))
    }

    async fn shutdown(&self) -> Result<(), RenderError> {
        self.recorder.shut_down.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.recorder.contexts_opened.load(Ordering::SeqCst)
            - self.recorder.contexts_closed.load(Ordering::SeqCst)
    }
}

pub struct ScriptedContext {
    pages: Arc<HashMap<String, ScriptedPage>>,
    recorder: Arc<Recorder>,
    current: Option<String>,
}

impl ScriptedContext {
    fn page(&self) -> Option<&ScriptedPage> {
        self.current.as_ref().and_then(|url| self.pages.get(url))
    }

    fn check_alive(&self) -> Result<(), RenderError> {
        if self.recorder.dead.load(Ordering::SeqCst) {
            Err(RenderError::SessionLost("browser gone".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RenderContext for ScriptedContext {
    async fn navigate(
        &mut self,
        url: &str,
        _timeout: Duration,
    ) -> Result<NavigationResult, RenderError> {
        self.check_alive()?;
        self.recorder.visited.lock().unwrap().push(url.to_string());
        let Some(page) = self.pages.get(url) else {
            self.current = None;
            return Err(RenderError::Navigation("net::ERR_NAME_NOT_RESOLVED".into()));
        };
        if !page.nav_delay.is_zero() {
            tokio::time::sleep(page.nav_delay).await;
        }
        if let Some(err) = &page.nav_error {
            if err.is_fatal() {
                self.recorder.dead.store(true, Ordering::SeqCst);
            }
            self.current = None;
            return Err(err.clone());
        }
        self.current = Some(url.to_string());
        Ok(NavigationResult {
            final_url: url.to_string(),
            load_time_ms: page.nav_delay.as_millis() as u64,
        })
    }

    async fn visible_text(
        &self,
        locator: &Locator,
        _wait: Duration,
    ) -> Result<Option<String>, RenderError> {
        self.check_alive()?;
        match self.page().and_then(|p| p.locators.get(locator.as_str())) {
            Some(LocatorScript::Text(text)) => Ok(Some(text.clone())),
            Some(LocatorScript::Hidden) | None => Ok(None),
            Some(LocatorScript::Error) => Err(RenderError::Script(format!(
                "invalid selector {}",
                locator.as_str()
            ))),
        }
    }

    async fn click_visible(&self, locator: &Locator, _wait: Duration) -> Result<bool, RenderError> {
        self.check_alive()?;
        let matches = self
            .page()
            .and_then(|p| p.consent.as_deref())
            .is_some_and(|consent| consent == locator.as_str());
        if matches {
            self.recorder
                .clicks
                .lock()
                .unwrap()
                .push(locator.as_str().to_string());
        }
        Ok(matches)
    }

    async fn body_text(&self, max_chars: usize) -> Result<String, RenderError> {
        self.check_alive()?;
        self.recorder.body_reads.fetch_add(1, Ordering::SeqCst);
        let body = self.page().map(|p| p.body.as_str()).unwrap_or("");
        Ok(truncate_chars(body, max_chars).to_string())
    }

    async fn screenshot_full_page(&self, _timeout: Duration) -> Result<Vec<u8>, RenderError> {
        self.check_alive()?;
        match self.page().and_then(|p| p.screenshot_error.clone()) {
            Some(err) => Err(err),
            None => Ok(b"\x89PNG\r\n\x1a\nscripted".to_vec()),
        }
    }

    async fn close(self: Box<Self>) -> Result<(), RenderError> {
        self.recorder.contexts_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Configuration with every wait zeroed so tests run instantly.
pub fn fast_config() -> CaptureConfig {
    CaptureConfig {
        settle_delay: Duration::ZERO,
        nav_timeout: Duration::from_secs(5),
        selector_wait: Duration::ZERO,
        consent_wait: Duration::ZERO,
        ..CaptureConfig::default()
    }
}
