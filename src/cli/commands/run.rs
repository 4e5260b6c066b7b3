//! One-shot refresh command.

use console::style;

use super::super::helpers::{build_coordinator, open_store, print_emisores};
use crate::config::Settings;
use crate::services::RefreshOutcome;

/// Refresh once, print the most recent rows and exit.
pub async fn cmd_run(settings: &Settings, sample: usize) -> anyhow::Result<()> {
    let repo = open_store(settings).await?;
    let refresh = build_coordinator(settings, repo.clone());

    println!(
        "{} Refreshing issuer list from {}",
        style("→").cyan(),
        settings.target_url
    );

    let result = refresh.request_refresh().await;
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("  {} Refresh failed: {}", style("✗").red(), e);
            repo.close().await;
            return Err(e.into());
        }
    };

    if let RefreshOutcome::Completed { records } = outcome {
        println!("  {} Stored {} records", style("✓").green(), records);
    }

    if sample > 0 {
        let rows = repo.latest(sample as i64).await?;
        println!();
        println!("{}", style(format!("Sample ({} rows):", rows.len())).bold());
        print_emisores(&rows);
    }

    repo.close().await;
    Ok(())
}
