//! dgii-emisores - mirror of the DGII electronic invoice issuer list.
//!
//! Downloads the published issuer list with a headless browser, loads it
//! into SQLite and serves it over a small JSON API.

pub mod cli;
pub mod config;
pub mod models;
pub mod rate_limit;
pub mod repository;
pub mod schema;
pub mod scrapers;
pub mod server;
pub mod services;
pub mod utils;
