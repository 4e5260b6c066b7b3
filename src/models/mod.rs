//! Data models for the issuer registry.

mod emisor;

pub use emisor::{Emisor, StoredEmisor};
