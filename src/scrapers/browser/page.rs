//! Chromium page adapter for the trigger locator.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::element::Element;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use tracing::{debug, info, warn};

use crate::scrapers::error::ExtractError;
use crate::scrapers::locator::{
    dom_scan_script, xpath_paths_script, ElementGeometry, TextQuery, TriggerSurface,
    DISPATCH_CLICK_FN, GEOMETRY_FN,
};

/// Waits applied after navigation.
#[derive(Debug, Clone)]
pub struct PageTiming {
    /// Navigation and network-idle budget.
    pub navigation_timeout: Duration,
    /// Quiet period with no new resource loads that counts as idle.
    pub idle_window: Duration,
    /// Extra pause after the page settles, for late scripts.
    pub settle_delay: Duration,
    /// Pause between scrolling down and back up.
    pub scroll_pause: Duration,
}

impl PageTiming {
    pub fn new(navigation_timeout: Duration) -> Self {
        Self {
            navigation_timeout,
            idle_window: Duration::from_millis(500),
            settle_delay: Duration::from_secs(3),
            scroll_pause: Duration::from_secs(1),
        }
    }
}

const READY_STATE_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete' || document.readyState === 'interactive') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
            // Fallback timeout in case event never fires
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
"#;

const RESOURCE_COUNT_SCRIPT: &str = "performance.getEntriesByType('resource').length";

/// A live Chromium tab.
pub struct ChromiumSurface {
    page: Page,
    timing: PageTiming,
}

impl ChromiumSurface {
    pub fn new(page: Page, timing: PageTiming) -> Self {
        Self { page, timing }
    }

    /// Navigate and wait until the DOM is ready and the network is quiet.
    pub async fn navigate(&self, url: &str) -> Result<(), ExtractError> {
        info!("Navigating to {}", url);
        let timeout = self.timing.navigation_timeout;

        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(ExtractError::Navigation(e.to_string())),
            Err(_) => {
                return Err(ExtractError::NavigationTimeout {
                    url: url.to_string(),
                    timeout,
                })
            }
        }

        let ready = self.page.evaluate(READY_STATE_SCRIPT.to_string());
        match tokio::time::timeout(timeout, ready).await {
            Ok(Ok(result)) => {
                let state: String = result
                    .into_value()
                    .unwrap_or_else(|_| "unknown".to_string());
                debug!("Page ready state: {}", state);
            }
            Ok(Err(e)) => debug!("Could not check ready state: {}", e),
            Err(_) => {
                return Err(ExtractError::NavigationTimeout {
                    url: url.to_string(),
                    timeout,
                })
            }
        }

        self.wait_for_network_idle(url).await?;

        info!("Waiting for the page to settle");
        tokio::time::sleep(self.timing.settle_delay).await;
        Ok(())
    }

    /// Poll resource timing entries until none have been added for the
    /// idle window.
    async fn wait_for_network_idle(&self, url: &str) -> Result<(), ExtractError> {
        let deadline = Instant::now() + self.timing.navigation_timeout;
        let step = Duration::from_millis(100);
        let mut last_count = -1i64;
        let mut quiet_since = Instant::now();

        loop {
            let count: i64 = self
                .page
                .evaluate(RESOURCE_COUNT_SCRIPT.to_string())
                .await?
                .into_value()
                .unwrap_or(0);

            if count != last_count {
                last_count = count;
                quiet_since = Instant::now();
            } else if quiet_since.elapsed() >= self.timing.idle_window {
                debug!("Network idle after {} resources", count);
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(ExtractError::NavigationTimeout {
                    url: url.to_string(),
                    timeout: self.timing.navigation_timeout,
                });
            }
            tokio::time::sleep(step).await;
        }
    }

    /// Write a full-page screenshot, logging instead of failing.
    pub async fn save_screenshot(&self, path: &Path) {
        let params = ScreenshotParams::builder().full_page(true).build();
        match self.page.screenshot(params).await {
            Ok(bytes) => match tokio::fs::write(path, bytes).await {
                Ok(()) => info!("Saved debug screenshot to {}", path.display()),
                Err(e) => warn!("Could not write screenshot: {}", e),
            },
            Err(e) => warn!("Could not take screenshot: {}", e),
        }
    }

    /// Close the tab.
    pub async fn close(self) {
        if let Err(e) = self.page.close().await {
            debug!("Error closing page: {}", e);
        }
    }

    async fn resolve_paths(&self, script: String) -> Result<Vec<Element>, ExtractError> {
        let paths: Vec<String> = self
            .page
            .evaluate(script)
            .await?
            .into_value()
            .map_err(|e| ExtractError::Browser(format!("Unexpected script result: {}", e)))?;

        let mut elements = Vec::with_capacity(paths.len());
        for path in paths {
            match self.page.find_element(path.as_str()).await {
                Ok(el) => elements.push(el),
                Err(e) => debug!("Could not resolve {}: {}", path, e),
            }
        }
        Ok(elements)
    }
}

#[async_trait]
impl TriggerSurface for ChromiumSurface {
    type Handle = Element;

    async fn query_css(&self, selector: &str) -> Result<Vec<Element>, ExtractError> {
        Ok(self.page.find_elements(selector).await?)
    }

    async fn query_text(&self, query: &TextQuery) -> Result<Vec<Element>, ExtractError> {
        self.resolve_paths(xpath_paths_script(&query.to_xpath())).await
    }

    async fn scan_dom(&self, keyword: &str) -> Result<Vec<Element>, ExtractError> {
        self.resolve_paths(dom_scan_script(keyword)).await
    }

    async fn geometry(&self, handle: &Element) -> Result<Option<ElementGeometry>, ExtractError> {
        let returns = handle.call_js_fn(GEOMETRY_FN, false).await?;
        let Some(raw) = returns.result.value.as_ref().and_then(|v| v.as_str()) else {
            return Ok(None);
        };
        serde_json::from_str(raw)
            .map(Some)
            .map_err(|e| ExtractError::Browser(format!("Bad geometry payload: {}", e)))
    }

    async fn scroll_cycle(&self) -> Result<(), ExtractError> {
        self.page
            .evaluate("window.scrollTo(0, document.body.scrollHeight)".to_string())
            .await?;
        tokio::time::sleep(self.timing.scroll_pause).await;
        self.page
            .evaluate("window.scrollTo(0, 0)".to_string())
            .await?;
        Ok(())
    }

    async fn click(&self, handle: &Element) -> Result<(), ExtractError> {
        handle.click().await?;
        Ok(())
    }

    async fn dispatch_click(&self, handle: &Element) -> Result<(), ExtractError> {
        handle.call_js_fn(DISPATCH_CLICK_FN, false).await?;
        Ok(())
    }
}
