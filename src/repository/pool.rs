//! Shared SQLite connection handle.
//!
//! The store talks to one database file through a single connection that is
//! opened on first use and reused by every query afterwards. There is no
//! pool. `close()` releases the handle and the next query reopens it.

use std::path::Path;
use std::sync::Arc;

use diesel::sqlite::SqliteConnection;
use diesel::Connection;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::SimpleAsyncConnection;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::debug;

use super::emisores::register_fold_case;
use super::util::to_diesel_error;

/// Diesel error type alias.
pub type DieselError = diesel::result::Error;

/// Async SQLite connection type.
pub type SqliteConn = SyncConnectionWrapper<SqliteConnection>;

/// Borrowed access to the shared connection.
pub type ConnGuard<'a> = MappedMutexGuard<'a, SqliteConn>;

/// Lazily opened, process-wide SQLite connection.
#[derive(Clone)]
pub struct SharedConnection {
    database_url: String,
    conn: Arc<Mutex<Option<SqliteConn>>>,
}

impl SharedConnection {
    /// Create a handle for `database_url` without connecting.
    pub fn new(database_url: &str) -> Self {
        // Strip sqlite: prefix if present
        let url = database_url.strip_prefix("sqlite:").unwrap_or(database_url);
        Self {
            database_url: url.to_string(),
            conn: Arc::new(Mutex::new(None)),
        }
    }

    /// Create a handle from a file path.
    pub fn from_path(path: &Path) -> Self {
        Self::new(&path.display().to_string())
    }

    /// Get the database URL.
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Whether the connection is currently open.
    pub async fn is_open(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    /// Borrow the connection, opening it first if needed.
    ///
    /// Callers hold the guard for the duration of one query or transaction;
    /// other callers wait on it.
    pub async fn acquire(&self) -> Result<ConnGuard<'_>, DieselError> {
        let mut guard = self.conn.lock().await;
        if guard.is_none() {
            *guard = Some(self.open().await?);
        }
        MutexGuard::try_map(guard, |slot| slot.as_mut())
            .map_err(|_| to_diesel_error("database connection unavailable"))
    }

    /// Drop the connection. The next `acquire` reconnects.
    pub async fn close(&self) {
        if self.conn.lock().await.take().is_some() {
            debug!("Closed database connection to {}", self.database_url);
        }
    }

    async fn open(&self) -> Result<SqliteConn, DieselError> {
        let url = self.database_url.clone();
        // Custom functions must be registered on the raw connection
        let raw = tokio::task::spawn_blocking(move || -> Result<SqliteConnection, DieselError> {
            let mut raw = SqliteConnection::establish(&url).map_err(to_diesel_error)?;
            register_fold_case(&mut raw)?;
            Ok(raw)
        })
        .await
        .map_err(to_diesel_error)??;

        let mut conn = SqliteConn::new(raw);
        conn.batch_execute("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")
            .await?;
        debug!("Opened database connection to {}", self.database_url);
        Ok(conn)
    }
}
