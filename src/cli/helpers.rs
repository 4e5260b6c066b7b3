//! Shared helper functions for CLI commands.

use std::sync::Arc;

use console::style;

use crate::config::Settings;
use crate::models::StoredEmisor;
use crate::repository::{EmisorRepository, SharedConnection};
use crate::scrapers::{ChromiumExtractor, ExtractorSettings};
use crate::services::{RecordTransformer, RefreshCoordinator};
use crate::utils::ensure_dir;

/// Open the store and make sure its table exists.
pub async fn open_store(settings: &Settings) -> anyhow::Result<EmisorRepository> {
    if let Some(parent) = settings.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent).await?;
        }
    }
    let repo = EmisorRepository::new(SharedConnection::from_path(&settings.db_path));
    repo.ensure_schema().await?;
    Ok(repo)
}

/// Wire the browser extractor, transformer and store into a coordinator.
pub fn build_coordinator(settings: &Settings, repo: EmisorRepository) -> RefreshCoordinator {
    let extractor = ChromiumExtractor::new(ExtractorSettings::from_settings(settings));
    RefreshCoordinator::new(Arc::new(extractor), RecordTransformer::default(), repo)
}

/// Print issuer rows, one per line.
pub fn print_emisores(rows: &[StoredEmisor]) {
    for row in rows {
        let r = &row.record;
        let trade_name = if r.nombre_comercial.is_empty() {
            String::new()
        } else {
            format!(" ({})", r.nombre_comercial)
        };
        println!(
            "  {} {}{}  {}",
            style(&r.rnc).cyan(),
            r.razon_social,
            style(trade_name).dim(),
            style(&r.fecha_autorizacion).dim()
        );
    }
}

/// Parse a bind address that can be:
/// - Just a port: "3030" -> <default host>:3030
/// - Just a host: "127.0.0.1" -> 127.0.0.1:<default port>
/// - Host and port: "0.0.0.0:3030" -> 0.0.0.0:3030
pub fn parse_bind_address(
    bind: &str,
    default_host: &str,
    default_port: u16,
) -> anyhow::Result<(String, u16)> {
    let bind = bind.trim();
    if bind.is_empty() {
        anyhow::bail!("Empty bind address");
    }

    // Try parsing as just a port number
    if let Ok(port) = bind.parse::<u16>() {
        return Ok((default_host.to_string(), port));
    }

    if let Some((host, port_str)) = bind.rsplit_once(':') {
        // IPv6 literal without a port, e.g. "::1"
        if host.ends_with(':') || (host.contains(':') && !host.starts_with('[')) {
            return Ok((bind.to_string(), default_port));
        }
        let port = port_str
            .parse::<u16>()
            .map_err(|_| anyhow::anyhow!("Invalid port in bind address: {}", bind))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        return Ok((host.to_string(), port));
    }

    // Must be just a host, use default port
    Ok((bind.to_string(), default_port))
}
