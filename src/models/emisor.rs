//! Issuer record models.

use serde::{Deserialize, Serialize};

/// One row of the published issuer list.
///
/// Every field is kept as free text exactly as published; no date or number
/// coercion happens anywhere in the pipeline. `rnc` is the tax id used for
/// point lookups but nothing guarantees it is unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emisor {
    pub orden: String,
    pub rnc: String,
    pub razon_social: String,
    pub nombre_comercial: String,
    pub fecha_autorizacion: String,
    pub fecha_limite: String,
}

impl Emisor {
    /// Field names in the positional order of the published file.
    pub const COLUMNS: [&'static str; 6] = [
        "orden",
        "rnc",
        "razon_social",
        "nombre_comercial",
        "fecha_autorizacion",
        "fecha_limite",
    ];

    /// Build a record from positional fields, trimming each value.
    ///
    /// Missing trailing fields become empty strings and extra fields are
    /// ignored.
    pub fn from_fields<'a, I>(fields: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut values = fields.into_iter().map(|f| f.trim().to_string());
        let mut next = || values.next().unwrap_or_default();
        Self {
            orden: next(),
            rnc: next(),
            razon_social: next(),
            nombre_comercial: next(),
            fecha_autorizacion: next(),
            fecha_limite: next(),
        }
    }
}

/// A persisted issuer row with its storage identity and insertion time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEmisor {
    pub id: i32,
    #[serde(flatten)]
    pub record: Emisor,
    pub created_at: Option<String>,
}
