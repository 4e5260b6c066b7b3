//! Delimited-file parsing into issuer records.
//!
//! The published file's header row is unreliable, so it is skipped and the
//! six fields are mapped by position.

use std::path::Path;

use csv::{ReaderBuilder, Trim};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::Emisor;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("CSV file is empty or corrupt: {0}")]
    EmptyOrCorrupt(String),

    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error reading CSV: {0}")]
    Io(#[from] std::io::Error),
}

/// Parses the downloaded file into `Emisor` rows.
#[derive(Debug, Clone)]
pub struct RecordTransformer {
    delimiter: u8,
}

impl Default for RecordTransformer {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl RecordTransformer {
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// Read and parse the whole file.
    pub async fn parse(&self, path: &Path) -> Result<Vec<Emisor>, TransformError> {
        info!("Processing CSV {}", path.display());
        let bytes = tokio::fs::read(path).await?;
        let records = self.parse_bytes(&bytes)?;
        info!("Parsed {} records from {}", records.len(), path.display());
        Ok(records)
    }

    /// Parse file content already in memory.
    ///
    /// Content with at most one non-blank line is rejected before any row
    /// is processed.
    pub fn parse_bytes(&self, bytes: &[u8]) -> Result<Vec<Emisor>, TransformError> {
        let decoded = decode(bytes);
        let text = decoded.strip_prefix('\u{feff}').unwrap_or(&decoded);

        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        match lines.next() {
            None => return Err(TransformError::EmptyOrCorrupt("no content".to_string())),
            Some(header) => debug!("Original header: {}", header),
        }
        if lines.next().is_none() {
            return Err(TransformError::EmptyOrCorrupt(
                "only a header line".to_string(),
            ));
        }

        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(text.as_bytes());

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            records.push(Emisor::from_fields(row.iter()));
        }
        Ok(records)
    }
}

/// UTF-8 if valid, otherwise Latin-1.
fn decode(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}
