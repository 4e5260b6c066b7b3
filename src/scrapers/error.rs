//! Extraction error types.

use std::time::Duration;

use thiserror::Error;

use crate::utils::RetryError;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Navigation to {url} timed out after {}s", .timeout.as_secs())]
    NavigationTimeout { url: String, timeout: Duration },

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Download trigger matching {keyword:?} not found after {passes} passes")]
    ElementNotFound { keyword: String, passes: u32 },

    #[error("Timed out waiting for download after {}s", .elapsed.as_secs())]
    DownloadTimeout { elapsed: Duration },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{label} failed after {attempts} attempts. Last error: {message}")]
    Exhausted {
        label: String,
        attempts: u32,
        message: String,
    },
}

impl From<RetryError<ExtractError>> for ExtractError {
    fn from(e: RetryError<ExtractError>) -> Self {
        Self::Exhausted {
            label: e.label,
            attempts: e.attempts,
            message: e.last.to_string(),
        }
    }
}

#[cfg(feature = "browser")]
impl From<chromiumoxide::error::CdpError> for ExtractError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        Self::Browser(e.to_string())
    }
}
