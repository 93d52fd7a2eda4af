//! Run configuration.

use crate::extract::body_scan::DEFAULT_SCAN_LIMIT;
use crate::renderer::chromium::LaunchOptions;
use anyhow::{anyhow, bail, Context, Result};
use chrono_tz::Tz;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Browser viewport, written `WIDTHxHEIGHT` on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ViewportSize {
    fn default() -> Self {
        Self {
            width: 1366,
            height: 768,
        }
    }
}

impl FromStr for ViewportSize {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        let (w, h) = lower
            .split_once('x')
            .ok_or_else(|| anyhow!("viewport must look like 1366x768, got '{s}'"))?;
        let width: u32 = w.trim().parse().with_context(|| format!("bad viewport width in '{s}'"))?;
        let height: u32 = h.trim().parse().with_context(|| format!("bad viewport height in '{s}'"))?;
        if width == 0 || height == 0 {
            bail!("viewport dimensions must be positive, got '{s}'");
        }
        Ok(Self { width, height })
    }
}

impl fmt::Display for ViewportSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Parse an IANA timezone identifier such as `Europe/Rome`.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|e| anyhow!("unknown timezone '{name}': {e}"))
}

/// Settings for one capture run.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub viewport: ViewportSize,
    /// Fixed wait after navigation before extraction starts.
    pub settle_delay: Duration,
    /// Upper bound for reaching DOM construction on each page.
    pub nav_timeout: Duration,
    /// Per-locator visibility wait inside the selector cascade.
    pub selector_wait: Duration,
    /// Per-locator wait while looking for a consent overlay (zero = check once).
    pub consent_wait: Duration,
    /// Zone used to stamp `captured_at_local`.
    pub timezone: Tz,
    /// Maximum characters of body text read by the body scan.
    pub body_scan_limit: usize,
    /// Independent browser tabs working in parallel (1 = sequential).
    pub workers: usize,
    pub rules_path: Option<PathBuf>,
    pub chromium_path: Option<PathBuf>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            viewport: ViewportSize::default(),
            settle_delay: Duration::from_millis(1500),
            nav_timeout: Duration::from_millis(45_000),
            selector_wait: Duration::from_millis(1500),
            consent_wait: Duration::ZERO,
            timezone: Tz::UTC,
            body_scan_limit: DEFAULT_SCAN_LIMIT,
            workers: 1,
            rules_path: None,
            chromium_path: None,
        }
    }
}

impl CaptureConfig {
    /// Reject settings that would make every task fail.
    pub fn validate(&self) -> Result<()> {
        if self.nav_timeout.is_zero() {
            bail!("navigation timeout must be greater than zero");
        }
        if self.workers == 0 {
            bail!("workers must be at least 1");
        }
        Ok(())
    }

    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            viewport_width: self.viewport.width,
            viewport_height: self.viewport.height,
            chromium_path: self.chromium_path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_parse() {
        let vp: ViewportSize = "1920X1080".parse().unwrap();
        assert_eq!(vp, ViewportSize { width: 1920, height: 1080 });
        assert_eq!(vp.to_string(), "1920x1080");
    }

    #[test]
    fn test_viewport_rejects_garbage() {
        assert!("1920".parse::<ViewportSize>().is_err());
        assert!("0x768".parse::<ViewportSize>().is_err());
        assert!("wide x tall".parse::<ViewportSize>().is_err());
    }

    #[test]
    fn test_timezone() {
        assert_eq!(parse_timezone("Europe/Rome").unwrap(), Tz::Europe__Rome);
        assert!(parse_timezone("Mars/Olympus").is_err());
    }

    #[test]
    fn test_defaults_validate() {
        let config = CaptureConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.viewport.to_string(), "1366x768");
        let broken = CaptureConfig {
            workers: 0,
            ..CaptureConfig::default()
        };
        assert!(broken.validate().is_err());
    }
}
