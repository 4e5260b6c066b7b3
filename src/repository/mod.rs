//! Repository layer for database persistence.
//!
//! All database access uses Diesel ORM with compile-time query checking
//! against a single SQLite file.

pub mod emisores;
pub mod models;
pub mod pool;
pub mod util;

pub use emisores::{EmisorRepository, SEARCH_LIMIT};
pub use pool::{DieselError, SharedConnection};
