//! Dataset extraction from the DGII portal.
//!
//! - `locator`: finds the download trigger on the rendered page
//! - `download`: detects the finished file in the download directory
//! - `extract`: composes both into retried browser attempts
//! - `browser`: Chrome session and page adapter

pub mod browser;
pub mod download;
pub mod error;
pub mod extract;
pub mod locator;

pub use browser::BrowserSession;
pub use download::{DetectorConfig, DownloadCandidate, DownloadDetector};
pub use error::ExtractError;
pub use extract::{
    run_attempt, AttemptContext, BrowserExtractor, ChromeLauncher, ChromiumExtractor,
    ExtractionSession, Extractor, ExtractorSettings, SessionLauncher,
};
pub use locator::{ElementLocator, LocatorConfig, MatchStage, TriggerSurface};
