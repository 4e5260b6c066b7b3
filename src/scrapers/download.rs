//! Download completion detection by polling the download directory.
//!
//! Browsers give no dependable "download finished" signal over CDP, so the
//! detector watches the directory instead and judges candidates by name,
//! size and modification time. File content is never inspected.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, info, warn};

use super::error::ExtractError;
use crate::utils::{list_files, FileEntry};

/// Extensions browsers use for files still being written.
pub const PARTIAL_MARKERS: [&str; 4] = ["crdownload", "part", "download", "tmp"];

/// Detector tuning.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Expected extension, without the dot.
    pub extension: String,
    /// Give up polling after this long.
    pub timeout: Duration,
    /// Wait before the first poll so the download can start.
    pub initial_delay: Duration,
    /// Files at or below this size are treated as still being written.
    pub min_size_bytes: u64,
    /// Modification window for accepting a reused file name.
    pub recent_window: Duration,
}

impl DetectorConfig {
    pub fn new(extension: &str, timeout: Duration) -> Self {
        Self {
            extension: extension.trim_start_matches('.').to_ascii_lowercase(),
            timeout,
            initial_delay: Duration::from_secs(3),
            min_size_bytes: 100,
            recent_window: Duration::from_secs(30),
        }
    }

    /// Poll interval: a tenth of the timeout, at most two seconds.
    pub fn poll_interval(&self) -> Duration {
        (self.timeout / 10).min(Duration::from_secs(2)).max(Duration::from_millis(10))
    }
}

/// A file that might be the finished download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadCandidate {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: SystemTime,
}

impl From<FileEntry> for DownloadCandidate {
    fn from(f: FileEntry) -> Self {
        Self {
            path: f.path,
            size_bytes: f.size,
            modified: f.modified,
        }
    }
}

/// Watches a directory for the file produced by a trigger click.
#[derive(Debug, Clone)]
pub struct DownloadDetector {
    config: DetectorConfig,
}

impl DownloadDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Wait for the download to land in `dir`.
    ///
    /// `before` is the set of file names present before the trigger was
    /// activated. On timeout the most recently modified file with the
    /// expected extension is returned if there is one.
    pub async fn wait_for_file(
        &self,
        dir: &Path,
        before: &HashSet<String>,
    ) -> Result<PathBuf, ExtractError> {
        let started = Instant::now();
        let interval = self.config.poll_interval();

        info!("Waiting for download in {}", dir.display());
        tokio::time::sleep(self.config.initial_delay).await;

        loop {
            if let Some(found) = self.poll(dir, before).await? {
                info!(
                    "Download detected: {} ({} bytes)",
                    found.path.display(),
                    found.size_bytes
                );
                return Ok(found.path);
            }

            if started.elapsed() >= self.config.timeout {
                break;
            }
            debug!(
                "No finished download yet ({:.1}s elapsed), checking again in {:?}",
                started.elapsed().as_secs_f64(),
                interval
            );
            tokio::time::sleep(interval).await;
        }

        match self.most_recent(dir).await? {
            Some(fallback) => {
                warn!(
                    "No new download detected, using most recent file: {}",
                    fallback.path.display()
                );
                Ok(fallback.path)
            }
            None => Err(ExtractError::DownloadTimeout {
                elapsed: started.elapsed(),
            }),
        }
    }

    /// One look at the directory.
    ///
    /// A new, complete-looking file wins. Failing that, any matching file
    /// modified within the recent window is accepted if it is big enough.
    async fn poll(
        &self,
        dir: &Path,
        before: &HashSet<String>,
    ) -> Result<Option<DownloadCandidate>, ExtractError> {
        let files: Vec<FileEntry> = list_files(dir)
            .await?
            .into_iter()
            .filter(|f| self.is_expected(f))
            .collect();

        let big_enough = |f: &FileEntry| f.size > self.config.min_size_bytes;

        if let Some(new_file) = files
            .iter()
            .filter(|f| !before.contains(&f.name))
            .find(|f| {
                if !big_enough(f) {
                    debug!("{} is only {} bytes, still writing?", f.name, f.size);
                }
                big_enough(f)
            })
        {
            return Ok(Some(new_file.clone().into()));
        }

        let now = SystemTime::now();
        let recent = files.into_iter().find(|f| {
            let age = now.duration_since(f.modified).unwrap_or(Duration::ZERO);
            age <= self.config.recent_window && big_enough(f)
        });
        Ok(recent.map(DownloadCandidate::from))
    }

    async fn most_recent(&self, dir: &Path) -> Result<Option<DownloadCandidate>, ExtractError> {
        Ok(list_files(dir)
            .await?
            .into_iter()
            .filter(|f| self.is_expected(f))
            .max_by_key(|f| f.modified)
            .map(DownloadCandidate::from))
    }

    fn is_expected(&self, file: &FileEntry) -> bool {
        let ext = file.extension();
        let partial = ext
            .as_deref()
            .map(|e| PARTIAL_MARKERS.contains(&e))
            .unwrap_or(false);
        !partial && ext.as_deref() == Some(self.config.extension.as_str())
    }
}
