//! Refresh coordination: extract, transform, load, one at a time.
//!
//! The coordinator owns the process-wide refresh state. HTTP handlers and
//! the scheduler share one coordinator and read the state through it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::transform::{RecordTransformer, TransformError};
use crate::repository::{DieselError, EmisorRepository};
use crate::scrapers::{ExtractError, Extractor};

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("Extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("Transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error("Store failed: {0}")]
    Store(#[from] DieselError),
}

/// Result of asking for a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The refresh ran and stored this many records.
    Completed { records: usize },
    /// Another refresh was already running; nothing was done.
    AlreadyRunning,
}

#[derive(Debug, Default)]
struct RefreshState {
    in_progress: AtomicBool,
    started_at: RwLock<Option<DateTime<Utc>>>,
    last_success: RwLock<Option<DateTime<Utc>>>,
}

impl RefreshState {
    fn set_started(&self, value: Option<DateTime<Utc>>) {
        *self.started_at.write().unwrap_or_else(|e| e.into_inner()) = value;
    }
}

/// Proof that the caller owns the single running refresh.
///
/// Dropping the guard marks the coordinator idle again, whichever way the
/// refresh ended.
#[derive(Debug)]
pub struct RefreshGuard {
    state: Arc<RefreshState>,
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.state.set_started(None);
        self.state.in_progress.store(false, Ordering::SeqCst);
    }
}

/// Serializes full refreshes and tracks their outcome.
#[derive(Clone)]
pub struct RefreshCoordinator {
    extractor: Arc<dyn Extractor>,
    transformer: RecordTransformer,
    store: EmisorRepository,
    state: Arc<RefreshState>,
}

impl RefreshCoordinator {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        transformer: RecordTransformer,
        store: EmisorRepository,
    ) -> Self {
        Self {
            extractor,
            transformer,
            store,
            state: Arc::new(RefreshState::default()),
        }
    }

    /// Claim the refresh slot. `None` if a refresh is already running.
    ///
    /// The check and the claim are one atomic step, so two concurrent
    /// callers can never both succeed.
    pub fn try_start(&self) -> Option<RefreshGuard> {
        self.state
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;
        self.state.set_started(Some(Utc::now()));
        Some(RefreshGuard {
            state: self.state.clone(),
        })
    }

    /// Run a refresh unless one is already in flight.
    pub async fn request_refresh(&self) -> Result<RefreshOutcome, RefreshError> {
        let Some(guard) = self.try_start() else {
            info!("Refresh already in progress, skipping");
            return Ok(RefreshOutcome::AlreadyRunning);
        };
        let records = self.run(guard).await?;
        Ok(RefreshOutcome::Completed { records })
    }

    /// Run the refresh owned by `guard`.
    pub async fn run(&self, guard: RefreshGuard) -> Result<usize, RefreshError> {
        info!("Starting DGII data refresh");
        let result = self.run_inner().await;
        drop(guard);

        match &result {
            Ok(count) => info!("Refresh completed with {} records", count),
            Err(e) => error!("Refresh failed: {}", e),
        }
        result
    }

    async fn run_inner(&self) -> Result<usize, RefreshError> {
        let path = self.extractor.extract().await?;
        let records = self.transformer.parse(&path).await?;
        let stored = self.store.replace_all(&records).await?;

        let now = Utc::now();
        *self.state.last_success.write().unwrap_or_else(|e| e.into_inner()) = Some(now);

        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!("Removed {}", path.display()),
            Err(e) => warn!("Could not remove {}: {}", path.display(), e),
        }

        Ok(stored)
    }

    /// Whether a refresh is running right now.
    pub fn is_updating(&self) -> bool {
        self.state.in_progress.load(Ordering::SeqCst)
    }

    /// When the current refresh started, if one is running.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        *self.state.started_at.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Time of the last successful refresh.
    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        *self.state.last_success.read().unwrap_or_else(|e| e.into_inner())
    }

    /// The store this coordinator loads into.
    pub fn store(&self) -> &EmisorRepository {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::SharedConnection;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};
    use tokio::sync::Notify;

    const CSV: &str = "ORDEN,RNC,RAZON SOCIAL,NOMBRE COMERCIAL,FECHA AUTORIZACION,FECHA LIMITE\n\
        1,101000001,ACME SRL,ACME,01/01/2024,\n\
        2,101000002,BETA SA,BETA,01/01/2024,\n\
        3,101000003,GAMMA EIRL,,01/02/2024,\n";

    struct FakeExtractor {
        dir: PathBuf,
        content: &'static str,
        calls: AtomicU32,
        gate: Option<Arc<Notify>>,
        fail: bool,
    }

    #[async_trait]
    impl Extractor for FakeExtractor {
        async fn extract(&self) -> Result<PathBuf, ExtractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail {
                return Err(ExtractError::DownloadTimeout {
                    elapsed: Duration::from_secs(60),
                });
            }
            let path = self.dir.join("lista.csv");
            tokio::fs::write(&path, self.content).await?;
            Ok(path)
        }
    }

    async fn coordinator(
        content: &'static str,
        gate: Option<Arc<Notify>>,
        fail: bool,
    ) -> (RefreshCoordinator, Arc<FakeExtractor>, TempDir) {
        let dir = tempdir().unwrap();
        let store = EmisorRepository::new(SharedConnection::from_path(&dir.path().join("t.db")));
        store.ensure_schema().await.unwrap();
        let extractor = Arc::new(FakeExtractor {
            dir: dir.path().to_path_buf(),
            content,
            calls: AtomicU32::new(0),
            gate,
            fail,
        });
        let coordinator =
            RefreshCoordinator::new(extractor.clone(), RecordTransformer::default(), store);
        (coordinator, extractor, dir)
    }

    #[tokio::test]
    async fn test_successful_refresh() {
        let (c, _ex, dir) = coordinator(CSV, None, false).await;
        assert!(c.last_success().is_none());

        let outcome = c.request_refresh().await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Completed { records: 3 });
        assert_eq!(c.store().count().await.unwrap(), 3);
        assert!(c.last_success().is_some());
        assert!(!c.is_updating());

        // Downloaded file is cleaned up
        assert!(!dir.path().join("lista.csv").exists());
    }

    #[tokio::test]
    async fn test_concurrent_request_is_rejected() {
        let gate = Arc::new(Notify::new());
        let (c, ex, _dir) = coordinator(CSV, Some(gate.clone()), false).await;

        let first = {
            let c = c.clone();
            tokio::spawn(async move { c.request_refresh().await })
        };

        // Wait until the first refresh is inside the extractor
        while ex.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert!(c.is_updating());
        assert!(c.started_at().is_some());

        let second = c.request_refresh().await.unwrap();
        assert_eq!(second, RefreshOutcome::AlreadyRunning);

        gate.notify_one();
        let first = first.await.unwrap().unwrap();
        assert_eq!(first, RefreshOutcome::Completed { records: 3 });
        assert_eq!(ex.calls.load(Ordering::SeqCst), 1);
        assert_eq!(c.store().count().await.unwrap(), 3);
        assert!(c.started_at().is_none());
    }

    #[tokio::test]
    async fn test_failure_restores_idle() {
        let (c, _ex, _dir) = coordinator(CSV, None, true).await;

        let err = c.request_refresh().await.unwrap_err();
        assert!(matches!(err, RefreshError::Extract(_)));
        assert!(!c.is_updating());
        assert!(c.last_success().is_none());

        // Not stuck: the slot can be claimed again
        assert!(c.try_start().is_some());
    }

    #[tokio::test]
    async fn test_corrupt_file_keeps_previous_rows() {
        let (good, _ex, dir) = coordinator(CSV, None, false).await;
        good.request_refresh().await.unwrap();

        let store = good.store().clone();
        let bad_extractor = Arc::new(FakeExtractor {
            dir: dir.path().to_path_buf(),
            content: "ONLY,A,HEADER\n",
            calls: AtomicU32::new(0),
            gate: None,
            fail: false,
        });
        let bad = RefreshCoordinator::new(bad_extractor, RecordTransformer::default(), store);

        let err = bad.request_refresh().await.unwrap_err();
        assert!(matches!(err, RefreshError::Transform(TransformError::EmptyOrCorrupt(_))));
        assert_eq!(bad.store().count().await.unwrap(), 3);
    }

    #[test]
    fn test_guard_drop_releases_slot() {
        let state = Arc::new(RefreshState::default());
        state.in_progress.store(true, Ordering::SeqCst);
        drop(RefreshGuard {
            state: state.clone(),
        });
        assert!(!state.in_progress.load(Ordering::SeqCst));
    }
}
