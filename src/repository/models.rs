//! Diesel ORM models for the issuer table.

use diesel::prelude::*;

use crate::models::{Emisor, StoredEmisor};
use crate::schema::dgii_data;

/// Issuer row as read from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = dgii_data)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct EmisorRecord {
    pub id: i32,
    pub orden: String,
    pub rnc: String,
    pub razon_social: String,
    pub nombre_comercial: String,
    pub fecha_autorizacion: String,
    pub fecha_limite: String,
    pub created_at: Option<String>,
}

/// New issuer row for insertion. `id` and `created_at` are assigned by SQLite.
#[derive(Insertable, Debug)]
#[diesel(table_name = dgii_data)]
pub struct NewEmisor<'a> {
    pub orden: &'a str,
    pub rnc: &'a str,
    pub razon_social: &'a str,
    pub nombre_comercial: &'a str,
    pub fecha_autorizacion: &'a str,
    pub fecha_limite: &'a str,
}

impl<'a> From<&'a Emisor> for NewEmisor<'a> {
    fn from(e: &'a Emisor) -> Self {
        Self {
            orden: &e.orden,
            rnc: &e.rnc,
            razon_social: &e.razon_social,
            nombre_comercial: &e.nombre_comercial,
            fecha_autorizacion: &e.fecha_autorizacion,
            fecha_limite: &e.fecha_limite,
        }
    }
}

impl From<EmisorRecord> for StoredEmisor {
    fn from(r: EmisorRecord) -> Self {
        StoredEmisor {
            id: r.id,
            record: Emisor {
                orden: r.orden,
                rnc: r.rnc,
                razon_social: r.razon_social,
                nombre_comercial: r.nombre_comercial,
                fecha_autorizacion: r.fecha_autorizacion,
                fecha_limite: r.fecha_limite,
            },
            created_at: r.created_at,
        }
    }
}
