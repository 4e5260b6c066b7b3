//! Web server command.

use std::net::SocketAddr;

use console::style;
use tracing::{info, warn};

use super::super::helpers::{build_coordinator, open_store, parse_bind_address};
use crate::config::Settings;
use crate::server::{self, scheduler, AppState, RouterOptions};

async fn resolve(host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    tokio::net::lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| anyhow::anyhow!("Could not resolve bind address {}:{}", host, port))
}

/// Start the web server.
pub async fn cmd_serve(settings: &Settings, bind: Option<&str>) -> anyhow::Result<()> {
    let (host, port) = match bind {
        Some(bind) => parse_bind_address(bind, &settings.host, settings.port)?,
        None => (settings.host.clone(), settings.port),
    };
    let addr = resolve(&host, port).await?;

    println!("{} Preparing database...", style("→").cyan());
    let repo = match open_store(settings).await {
        Ok(repo) => {
            println!("  {} Database ready", style("✓").green());
            repo
        }
        Err(e) => {
            eprintln!("  {} Database setup failed: {}", style("✗").red(), e);
            return Err(e);
        }
    };

    let refresh = build_coordinator(settings, repo.clone());

    if settings.force_update_on_start {
        if let Some(guard) = refresh.try_start() {
            info!("Starting initial refresh");
            let initial = refresh.clone();
            tokio::spawn(async move {
                let _ = initial.run(guard).await;
            });
        }
    }

    let (mut cron, schedule) =
        match scheduler::start_scheduler(&settings.update_schedule, refresh.clone()).await {
            Ok((cron, schedule)) => (Some(cron), Some(schedule)),
            Err(e) => {
                warn!("Scheduler unavailable, refreshes only on demand: {}", e);
                (None, None)
            }
        };

    println!(
        "{} Serving API at http://{}/api/v1/emisores",
        style("→").cyan(),
        addr
    );
    println!("  Press Ctrl+C to stop");

    let state = AppState::new(refresh, schedule);
    let options = RouterOptions::new(settings.cors_origins.clone(), settings.rate_limit.clone());
    let result = server::serve(state, &options, addr, server::shutdown_signal()).await;

    if let Some(cron) = cron.as_mut() {
        if let Err(e) = cron.shutdown().await {
            warn!("Scheduler shutdown failed: {}", e);
        }
    }
    repo.close().await;
    println!("{} Server stopped", style("✓").green());

    result
}
