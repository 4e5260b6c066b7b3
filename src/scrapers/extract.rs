//! End-to-end extraction: open the page, find the trigger, catch the file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::browser::BrowserSession;
use super::download::{DetectorConfig, DownloadDetector};
use super::error::ExtractError;
use super::locator::{ElementLocator, LocatorConfig, TriggerSurface};
use crate::config::{BrowserEngineConfig, Settings};
use crate::utils::{ensure_dir, file_names, retry, RetryPolicy};

/// Name of the screenshot written when the trigger cannot be found.
pub const DEBUG_SCREENSHOT: &str = "debug_screenshot.png";

/// Label used in retry logs and the exhausted-attempts error.
pub const EXTRACTION_LABEL: &str = "CSV download";

/// Something that can produce the dataset file on disk.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Fetch the dataset and return the path of the downloaded file.
    async fn extract(&self) -> Result<PathBuf, ExtractError>;
}

/// Everything an extraction run needs.
#[derive(Debug, Clone)]
pub struct ExtractorSettings {
    pub target_url: String,
    pub download_dir: PathBuf,
    pub browser: BrowserEngineConfig,
    pub retry: RetryPolicy,
    pub locator: LocatorConfig,
    pub detector: DetectorConfig,
}

impl ExtractorSettings {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            target_url: settings.target_url.to_string(),
            download_dir: settings.download_path.clone(),
            browser: settings.browser.clone(),
            retry: RetryPolicy::new(settings.max_retries, settings.retry_delay),
            locator: LocatorConfig {
                passes: settings.max_retries,
                ..LocatorConfig::default()
            },
            detector: DetectorConfig::new("csv", settings.download_timeout),
        }
    }
}

/// Locate the trigger, click it and wait for the resulting file.
///
/// Falls back to a synthetic click event when the native click fails.
pub async fn run_attempt<S: TriggerSurface>(
    surface: &S,
    locator: &ElementLocator,
    detector: &DownloadDetector,
    download_dir: &Path,
) -> Result<PathBuf, ExtractError> {
    let located = locator.locate(surface).await?;

    let before = file_names(download_dir).await?;
    debug!("Files before download: {:?}", before);

    match surface.click(&located.handle).await {
        Ok(()) => info!("Clicked {} trigger", located.stage),
        Err(e) => {
            warn!("Direct click failed ({}), dispatching click event", e);
            surface.dispatch_click(&located.handle).await?;
        }
    }

    detector.wait_for_file(download_dir, &before).await
}

/// What a single attempt needs from the extractor.
pub struct AttemptContext<'a> {
    pub settings: &'a ExtractorSettings,
    pub locator: &'a ElementLocator,
    pub detector: &'a DownloadDetector,
}

/// An open browser that extraction attempts run against.
#[async_trait]
pub trait ExtractionSession: Send + Sync {
    /// One full attempt: navigate, click the trigger, wait for the file.
    async fn attempt(&self, ctx: &AttemptContext<'_>, attempt: u32) -> Result<PathBuf, ExtractError>;

    /// Release the browser. Called exactly once per launched session.
    async fn close(self);
}

/// Opens the session an extraction run works in.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    type Session: ExtractionSession;

    async fn launch(&self, settings: &ExtractorSettings) -> Result<Self::Session, ExtractError>;
}

/// Launches Chrome (or attaches to `BROWSER_URL`) through chromiumoxide.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeLauncher;

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    type Session = BrowserSession;

    async fn launch(&self, settings: &ExtractorSettings) -> Result<BrowserSession, ExtractError> {
        BrowserSession::start(&settings.browser, &settings.download_dir).await
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl ExtractionSession for BrowserSession {
    /// Runs on a fresh tab. The tab is always closed.
    async fn attempt(&self, ctx: &AttemptContext<'_>, attempt: u32) -> Result<PathBuf, ExtractError> {
        use super::browser::{ChromiumSurface, PageTiming};

        debug!("Extraction attempt {}", attempt);
        let dir = &ctx.settings.download_dir;
        let page = self.new_page().await?;
        let surface = ChromiumSurface::new(page, PageTiming::new(ctx.settings.browser.timeout));

        let result: Result<PathBuf, ExtractError> = async {
            surface.navigate(&ctx.settings.target_url).await?;
            match run_attempt(&surface, ctx.locator, ctx.detector, dir).await {
                Err(e @ ExtractError::ElementNotFound { .. }) => {
                    surface.save_screenshot(&dir.join(DEBUG_SCREENSHOT)).await;
                    Err(e)
                }
                other => other,
            }
        }
        .await;

        surface.close().await;
        result
    }

    async fn close(self) {
        BrowserSession::close(self).await
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl ExtractionSession for BrowserSession {
    async fn attempt(&self, _ctx: &AttemptContext<'_>, _attempt: u32) -> Result<PathBuf, ExtractError> {
        Err(ExtractError::Browser("Browser support not compiled".to_string()))
    }

    async fn close(self) {
        BrowserSession::close(self).await
    }
}

/// Browser-driven extractor for the DGII issuer list.
pub struct BrowserExtractor<L> {
    launcher: L,
    settings: ExtractorSettings,
    locator: ElementLocator,
    detector: DownloadDetector,
}

/// The production extractor.
pub type ChromiumExtractor = BrowserExtractor<ChromeLauncher>;

impl ChromiumExtractor {
    pub fn new(settings: ExtractorSettings) -> Self {
        Self::with_launcher(ChromeLauncher, settings)
    }
}

impl<L> BrowserExtractor<L> {
    pub fn with_launcher(launcher: L, settings: ExtractorSettings) -> Self {
        Self {
            launcher,
            locator: ElementLocator::new(settings.locator.clone()),
            detector: DownloadDetector::new(settings.detector.clone()),
            settings,
        }
    }
}

#[async_trait]
impl<L: SessionLauncher> Extractor for BrowserExtractor<L> {
    async fn extract(&self) -> Result<PathBuf, ExtractError> {
        info!("Starting CSV download from {}", self.settings.target_url);
        ensure_dir(&self.settings.download_dir).await?;

        let session = self.launcher.launch(&self.settings).await?;
        let ctx = AttemptContext {
            settings: &self.settings,
            locator: &self.locator,
            detector: &self.detector,
        };

        let result = retry(EXTRACTION_LABEL, self.settings.retry, |attempt| {
            session.attempt(&ctx, attempt)
        })
        .await
        .map_err(ExtractError::from);

        session.close().await;

        if let Ok(path) = &result {
            info!("CSV downloaded: {}", path.display());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::scrapers::locator::fixture::{ClickKind, HtmlFixture};
    use tempfile::tempdir;

    const PAGE: &str = r#"<body>
        <h1>Listado de emisores</h1>
        <input id="csv" type="submit" value="CSV" data-download="lista.csv">
    </body>"#;

    fn csv_body() -> String {
        let mut body = String::from("ORDEN,RNC,RAZON SOCIAL,NOMBRE COMERCIAL,FECHA AUTORIZACION,FECHA LIMITE\n");
        for i in 1..=5 {
            body.push_str(&format!("{i},10100000{i},EMPRESA {i} SRL,EMPRESA {i},01/01/2024,\n"));
        }
        body
    }

    fn parts() -> (ElementLocator, DownloadDetector) {
        let locator = ElementLocator::new(LocatorConfig {
            pass_delay: Duration::from_millis(1),
            ..LocatorConfig::default()
        });
        let mut detector = DetectorConfig::new("csv", Duration::from_millis(200));
        detector.initial_delay = Duration::ZERO;
        (locator, DownloadDetector::new(detector))
    }

    #[tokio::test]
    async fn test_attempt_clicks_and_detects_download() {
        let dir = tempdir().unwrap();
        let page = HtmlFixture::new(PAGE).with_download_dir(dir.path().to_path_buf(), csv_body());
        let (locator, detector) = parts();

        let path = run_attempt(&page, &locator, &detector, dir.path()).await.unwrap();
        assert_eq!(path, dir.path().join("lista.csv"));
        assert_eq!(page.clicks().len(), 1);
        assert_eq!(page.clicks()[0].1, ClickKind::Native);
    }

    #[tokio::test]
    async fn test_attempt_falls_back_to_synthetic_click() {
        let dir = tempdir().unwrap();
        let page = HtmlFixture::new(PAGE)
            .with_download_dir(dir.path().to_path_buf(), csv_body())
            .with_failing_click();
        let (locator, detector) = parts();

        let path = run_attempt(&page, &locator, &detector, dir.path()).await.unwrap();
        assert_eq!(path, dir.path().join("lista.csv"));
        let clicks = page.clicks();
        assert_eq!(clicks.len(), 1);
        assert_eq!(clicks[0].1, ClickKind::Synthetic);
        assert_eq!(page.id_of(clicks[0].0).as_deref(), Some("csv"));
    }

    #[tokio::test]
    async fn test_attempt_reports_missing_trigger() {
        let dir = tempdir().unwrap();
        let page = HtmlFixture::new("<body><p>Mantenimiento</p></body>");
        let (locator, detector) = parts();

        let err = run_attempt(&page, &locator, &detector, dir.path()).await.unwrap_err();
        assert!(matches!(err, ExtractError::ElementNotFound { .. }));
        assert!(page.clicks().is_empty());
    }

    #[tokio::test]
    async fn test_retry_wraps_attempt_errors() {
        let dir = tempdir().unwrap();
        let page = HtmlFixture::new("<body></body>");
        let (locator, detector) = parts();
        let policy = RetryPolicy::new(2, Duration::from_millis(1));

        let err: ExtractError = retry(EXTRACTION_LABEL, policy, |_| {
            run_attempt(&page, &locator, &detector, dir.path())
        })
        .await
        .map_err(ExtractError::from)
        .unwrap_err();

        let message = err.to_string();
        assert!(message.starts_with("CSV download failed after 2 attempts"));
        assert!(message.contains("not found"));
    }

    #[derive(Default)]
    struct Calls {
        launches: AtomicU32,
        attempts: AtomicU32,
        closes: AtomicU32,
    }

    struct FakeLauncher {
        calls: Arc<Calls>,
        succeed_on: Option<u32>,
    }

    struct FakeSession {
        calls: Arc<Calls>,
        succeed_on: Option<u32>,
    }

    #[async_trait]
    impl SessionLauncher for FakeLauncher {
        type Session = FakeSession;

        async fn launch(&self, _settings: &ExtractorSettings) -> Result<FakeSession, ExtractError> {
            self.calls.launches.fetch_add(1, Ordering::SeqCst);
            Ok(FakeSession {
                calls: self.calls.clone(),
                succeed_on: self.succeed_on,
            })
        }
    }

    #[async_trait]
    impl ExtractionSession for FakeSession {
        async fn attempt(&self, ctx: &AttemptContext<'_>, attempt: u32) -> Result<PathBuf, ExtractError> {
            self.calls.attempts.fetch_add(1, Ordering::SeqCst);
            if self.succeed_on == Some(attempt) {
                Ok(ctx.settings.download_dir.join("lista.csv"))
            } else {
                Err(ExtractError::Browser(format!("tab crashed on attempt {attempt}")))
            }
        }

        async fn close(self) {
            self.calls.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fake_extractor(dir: &Path, succeed_on: Option<u32>) -> (BrowserExtractor<FakeLauncher>, Arc<Calls>) {
        let calls = Arc::new(Calls::default());
        let settings = ExtractorSettings {
            target_url: "http://localhost/emisores".to_string(),
            download_dir: dir.to_path_buf(),
            browser: BrowserEngineConfig::default(),
            retry: RetryPolicy::new(3, Duration::from_millis(1)),
            locator: LocatorConfig::default(),
            detector: DetectorConfig::new("csv", Duration::from_millis(100)),
        };
        let launcher = FakeLauncher {
            calls: calls.clone(),
            succeed_on,
        };
        (BrowserExtractor::with_launcher(launcher, settings), calls)
    }

    #[tokio::test]
    async fn test_session_closed_once_after_exhausted_attempts() {
        let dir = tempdir().unwrap();
        let (extractor, calls) = fake_extractor(dir.path(), None);

        let err = extractor.extract().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "CSV download failed after 3 attempts. Last error: Browser error: tab crashed on attempt 3"
        );
        assert_eq!(calls.launches.load(Ordering::SeqCst), 1);
        assert_eq!(calls.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(calls.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_session_closed_once_after_success() {
        let dir = tempdir().unwrap();
        let (extractor, calls) = fake_extractor(dir.path(), Some(2));

        let path = extractor.extract().await.unwrap();
        assert_eq!(path, dir.path().join("lista.csv"));
        assert_eq!(calls.attempts.load(Ordering::SeqCst), 2);
        assert_eq!(calls.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_extract_creates_download_dir() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("downloads");
        let (extractor, _calls) = fake_extractor(&target, Some(1));

        extractor.extract().await.unwrap();
        assert!(target.is_dir());
    }

    #[test]
    fn test_settings_mapping() {
        let settings = Settings::from_lookup(|key| match key {
            "MAX_RETRIES" => Some("4".to_string()),
            "DOWNLOAD_TIMEOUT" => Some("1000".to_string()),
            _ => None,
        })
        .unwrap();
        let mapped = ExtractorSettings::from_settings(&settings);
        assert_eq!(mapped.retry.max_attempts, 4);
        assert_eq!(mapped.retry.delay, Duration::from_secs(5));
        assert_eq!(mapped.locator.passes, 4);
        assert_eq!(mapped.locator.keyword, "CSV");
        assert_eq!(mapped.detector.timeout, Duration::from_secs(1));
    }
}
