//! HTTP request handlers for the API.

mod emisores;
mod error;
mod status;

pub use emisores::{get_emisor, list_emisores, search_emisores};
pub use error::ApiError;
pub use status::{health, not_found, status, trigger_update};

use chrono::{DateTime, SecondsFormat, Utc};

/// ISO-8601 UTC timestamp with millisecond precision.
pub(crate) fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
