//! Chrome session management for the extraction flow.
//!
//! Uses chromiumoxide (CDP) to either launch a local Chrome with an
//! isolated profile or attach to a remote one, and to route downloads into
//! a directory we can watch.

#[cfg(feature = "browser")]
mod page;

#[cfg(feature = "browser")]
pub use page::{ChromiumSurface, PageTiming};

use std::path::Path;
#[cfg(feature = "browser")]
use std::path::PathBuf;

#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;
#[cfg(feature = "browser")]
use tokio::sync::Mutex;

use super::error::ExtractError;
use crate::config::BrowserEngineConfig;

/// Common Chrome executable paths to check.
#[cfg(feature = "browser")]
const CHROME_PATHS: &[&str] = &[
    // Linux
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    // macOS
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    // Common install locations
    "/opt/google/chrome/google-chrome",
];

/// Find Chrome executable.
#[cfg(feature = "browser")]
fn find_chrome(explicit: Option<&Path>) -> Result<PathBuf, ExtractError> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        warn!("CHROME_PATH {} does not exist, searching", path.display());
    }

    for path in CHROME_PATHS {
        let p = Path::new(path);
        if p.exists() {
            info!("Found Chrome at: {}", path);
            return Ok(p.to_path_buf());
        }
    }

    for cmd in [
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
    ] {
        if let Ok(path) = which::which(cmd) {
            info!("Found Chrome in PATH: {}", path.display());
            return Ok(path);
        }
    }

    Err(ExtractError::Browser(
        "Chrome/Chromium not found. Install it or set CHROME_PATH / BROWSER_URL".to_string(),
    ))
}

/// A running browser with downloads routed to one directory.
///
/// Owns the temporary profile directory for launched browsers; it is
/// removed when the session is dropped.
#[cfg(feature = "browser")]
pub struct BrowserSession {
    browser: Mutex<Browser>,
    handler: tokio::task::JoinHandle<()>,
    remote: bool,
    _profile: Option<tempfile::TempDir>,
}

#[cfg(feature = "browser")]
impl BrowserSession {
    /// Launch (or connect to) a browser and allow downloads into `download_dir`.
    pub async fn start(
        config: &BrowserEngineConfig,
        download_dir: &Path,
    ) -> Result<Self, ExtractError> {
        let session = match config.remote_url.as_deref() {
            Some(url) => Self::connect_remote(url).await?,
            None => Self::launch(config).await?,
        };

        // Setup failed after launch: the browser must not outlive us
        if let Err(e) = session.route_downloads(download_dir).await {
            session.close().await;
            return Err(e);
        }

        Ok(session)
    }

    async fn route_downloads(&self, download_dir: &Path) -> Result<(), ExtractError> {
        let download_path = std::path::absolute(download_dir)?;
        let params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(download_path.display().to_string())
            .build()
            .map_err(ExtractError::Browser)?;
        self.browser.lock().await.execute(params).await?;
        debug!("Downloads routed to {}", download_path.display());
        Ok(())
    }

    async fn launch(config: &BrowserEngineConfig) -> Result<Self, ExtractError> {
        info!("Launching browser (headless={})", config.headless);

        let chrome_path = find_chrome(config.chrome_path.as_deref())?;
        let profile = tempfile::Builder::new().prefix("emisores-chrome-").tempdir()?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .user_data_dir(profile.path())
            .window_size(1280, 720)
            .request_timeout(config.timeout);

        // Set headless mode (with_head means NOT headless, confusingly)
        if !config.headless {
            builder = builder.with_head();
        }

        builder = builder
            .arg("--no-sandbox") // Often needed for headless in containers/restricted environments
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-accelerated-2d-canvas")
            .arg("--no-first-run")
            .arg("--no-zygote")
            .arg("--disable-gpu")
            .arg("--window-size=1280,720");

        let browser_config = builder
            .build()
            .map_err(|e| ExtractError::Browser(format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config).await?;

        // Spawn handler task
        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser: Mutex::new(browser),
            handler,
            remote: false,
            _profile: Some(profile),
        })
    }

    /// Connect to a remote Chrome instance.
    async fn connect_remote(url: &str) -> Result<Self, ExtractError> {
        info!("Connecting to remote browser at {}", url);

        // Get WebSocket URL from the /json/version endpoint
        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .send()
            .await
            .map_err(|e| ExtractError::Browser(format!("Failed to reach remote browser: {}", e)))?
            .json()
            .await
            .map_err(|e| ExtractError::Browser(format!("Bad browser version info: {}", e)))?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ExtractError::Browser("No webSocketDebuggerUrl in response".into()))?;

        info!("Connecting to WebSocket: {}", ws_url);
        let (browser, mut handler) = Browser::connect(ws_url).await?;

        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser: Mutex::new(browser),
            handler,
            remote: true,
            _profile: None,
        })
    }

    /// Open a blank tab.
    pub async fn new_page(&self) -> Result<Page, ExtractError> {
        Ok(self.browser.lock().await.new_page("about:blank").await?)
    }

    /// Shut the browser down. Remote browsers are only disconnected.
    pub async fn close(self) {
        let mut browser = self.browser.into_inner();
        if !self.remote {
            if let Err(e) = browser.close().await {
                warn!("Error closing browser: {}", e);
            }
            if let Err(e) = browser.wait().await {
                debug!("Error waiting for browser exit: {}", e);
            }
        }
        self.handler.abort();
        info!("Browser session closed");
    }
}

// Stub for when browser feature is disabled
#[cfg(not(feature = "browser"))]
pub struct BrowserSession;

#[cfg(not(feature = "browser"))]
impl BrowserSession {
    pub async fn start(
        _config: &BrowserEngineConfig,
        _download_dir: &Path,
    ) -> Result<Self, ExtractError> {
        Err(ExtractError::Browser(
            "Browser support not compiled. Rebuild with: cargo build --features browser"
                .to_string(),
        ))
    }

    pub async fn close(self) {}
}
