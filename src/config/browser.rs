//! Browser engine configuration types.
//!
//! These types live here (always compiled) rather than behind
//! `#[cfg(feature = "browser")]` so that config parsing works without the
//! browser feature.

use std::path::PathBuf;
use std::time::Duration;

use super::{lookup_first, parse_bool, ConfigError};

/// Browser engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowserEngineConfig {
    /// Run in headless mode (default: true).
    /// Set to false to watch the browser while debugging the download flow.
    pub headless: bool,

    /// Navigation and network-idle timeout.
    pub timeout: Duration,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to existing browser instead of launching one.
    pub remote_url: Option<String>,

    /// Explicit Chrome executable; discovered automatically when unset.
    pub chrome_path: Option<PathBuf>,
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            headless: true,
            timeout: Duration::from_millis(30_000),
            remote_url: None,
            chrome_path: None,
        }
    }
}

impl BrowserEngineConfig {
    /// Apply environment variable overrides.
    ///
    /// - `BROWSER_HEADLESS` (legacy `PUPPETEER_HEADLESS`) - "false" shows the browser window
    /// - `BROWSER_URL` - Remote Chrome DevTools URL
    /// - `CHROME_PATH` - Chrome executable to launch
    /// - `NAVIGATION_TIMEOUT_MS` (legacy `PUPPETEER_TIMEOUT`) - navigation + network-idle timeout
    pub fn with_overrides<F>(mut self, lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some((key, val)) = lookup_first(lookup, &["BROWSER_HEADLESS", "PUPPETEER_HEADLESS"]) {
            self.headless = parse_bool(key, &val)?;
        }

        if let Some(val) = lookup("BROWSER_URL") {
            if !val.trim().is_empty() {
                self.remote_url = Some(val.trim().to_string());
            }
        }

        if let Some(val) = lookup("CHROME_PATH") {
            if !val.trim().is_empty() {
                self.chrome_path = Some(PathBuf::from(val.trim()));
            }
        }

        if let Some((key, val)) =
            lookup_first(lookup, &["NAVIGATION_TIMEOUT_MS", "PUPPETEER_TIMEOUT"])
        {
            let ms = val
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::invalid(key, &val))?;
            self.timeout = Duration::from_millis(ms);
        }

        Ok(self)
    }
}
