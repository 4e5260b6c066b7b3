//! Issuer repository for SQLite.
//!
//! Owns the `dgii_data` table: schema creation, the all-or-nothing replace
//! performed by each refresh, and the read queries behind the HTTP API.

use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl, SimpleAsyncConnection};
use tracing::{debug, info};

use super::models::{EmisorRecord, NewEmisor};
use super::pool::{DieselError, SharedConnection};
use super::util::escape_like;
use crate::models::{Emisor, StoredEmisor};
use crate::schema::dgii_data;

diesel::define_sql_function! {
    /// Unicode lowercase. SQLite's built-in `lower()` only folds ASCII.
    fn fold_case(x: diesel::sql_types::Text) -> diesel::sql_types::Text;
}

/// Install `fold_case` on a freshly opened connection.
pub(crate) fn register_fold_case(conn: &mut SqliteConnection) -> QueryResult<()> {
    fold_case_utils::register_impl(conn, |x: String| x.to_lowercase())
}

/// Upper bound on rows returned by `search`.
pub const SEARCH_LIMIT: i64 = 100;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS dgii_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    orden TEXT NOT NULL DEFAULT '',
    rnc TEXT NOT NULL DEFAULT '',
    razon_social TEXT NOT NULL DEFAULT '',
    nombre_comercial TEXT NOT NULL DEFAULT '',
    fecha_autorizacion TEXT NOT NULL DEFAULT '',
    fecha_limite TEXT NOT NULL DEFAULT '',
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);
"#;

/// Issuer repository backed by a single shared connection.
#[derive(Clone)]
pub struct EmisorRepository {
    db: SharedConnection,
}

impl EmisorRepository {
    /// Create a repository over an existing connection handle.
    pub fn new(db: SharedConnection) -> Self {
        Self { db }
    }

    /// Create the issuer table if it is missing. Never drops data.
    pub async fn ensure_schema(&self) -> Result<(), DieselError> {
        let mut conn = self.db.acquire().await?;
        conn.batch_execute(CREATE_TABLE).await?;
        debug!("Schema ready at {}", self.db.database_url());
        Ok(())
    }

    /// Replace every stored row with `records`, in input order.
    ///
    /// Delete and inserts run in one transaction: a failure part-way leaves
    /// the previous snapshot untouched.
    pub async fn replace_all(&self, records: &[Emisor]) -> Result<usize, DieselError> {
        let mut conn = self.db.acquire().await?;

        let inserted = conn
            .transaction(|conn| {
                Box::pin(async move {
                    let removed = diesel::delete(dgii_data::table).execute(conn).await?;
                    debug!("Removed {} previous rows", removed);

                    let mut inserted = 0;
                    for record in records {
                        inserted += diesel::insert_into(dgii_data::table)
                            .values(NewEmisor::from(record))
                            .execute(conn)
                            .await?;
                    }
                    Ok::<_, DieselError>(inserted)
                })
            })
            .await?;

        info!("Stored {} issuer records", inserted);
        Ok(inserted)
    }

    /// One page of issuers ordered by legal name.
    pub async fn get_page(&self, limit: i64, offset: i64) -> Result<Vec<StoredEmisor>, DieselError> {
        let mut conn = self.db.acquire().await?;

        dgii_data::table
            .order(dgii_data::razon_social.asc())
            .limit(limit)
            .offset(offset)
            .select(EmisorRecord::as_select())
            .load::<EmisorRecord>(&mut *conn)
            .await
            .map(|rows| rows.into_iter().map(StoredEmisor::from).collect())
    }

    /// First issuer with an exact tax id match.
    pub async fn get_by_rnc(&self, rnc: &str) -> Result<Option<StoredEmisor>, DieselError> {
        let mut conn = self.db.acquire().await?;

        dgii_data::table
            .filter(dgii_data::rnc.eq(rnc))
            .select(EmisorRecord::as_select())
            .first::<EmisorRecord>(&mut *conn)
            .await
            .optional()
            .map(|opt| opt.map(StoredEmisor::from))
    }

    /// Case-insensitive substring search on legal or trade name.
    ///
    /// The term is matched literally; LIKE wildcards in it are escaped.
    pub async fn search(
        &self,
        term: &str,
        max_results: i64,
    ) -> Result<Vec<StoredEmisor>, DieselError> {
        let mut conn = self.db.acquire().await?;
        let pattern = format!("%{}%", escape_like(&term.to_lowercase()));

        dgii_data::table
            .filter(
                fold_case(dgii_data::razon_social)
                    .like(pattern.clone())
                    .escape('\\')
                    .or(fold_case(dgii_data::nombre_comercial)
                        .like(pattern)
                        .escape('\\')),
            )
            .limit(max_results.min(SEARCH_LIMIT))
            .select(EmisorRecord::as_select())
            .load::<EmisorRecord>(&mut *conn)
            .await
            .map(|rows| rows.into_iter().map(StoredEmisor::from).collect())
    }

    /// Total number of stored issuers.
    pub async fn count(&self) -> Result<i64, DieselError> {
        let mut conn = self.db.acquire().await?;

        use diesel::dsl::count_star;
        dgii_data::table
            .select(count_star())
            .first(&mut *conn)
            .await
    }

    /// Most recently inserted issuers first.
    pub async fn latest(&self, limit: i64) -> Result<Vec<StoredEmisor>, DieselError> {
        let mut conn = self.db.acquire().await?;

        dgii_data::table
            .order((dgii_data::created_at.desc(), dgii_data::id.desc()))
            .limit(limit)
            .select(EmisorRecord::as_select())
            .load::<EmisorRecord>(&mut *conn)
            .await
            .map(|rows| rows.into_iter().map(StoredEmisor::from).collect())
    }

    /// Release the shared connection.
    pub async fn close(&self) {
        self.db.close().await;
    }
}
