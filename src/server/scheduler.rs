//! Cron-driven background refresh.

use chrono::Local;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{error, info, warn};

use crate::config::DEFAULT_SCHEDULE;
use crate::services::{RefreshCoordinator, RefreshOutcome};

/// Accept classic 5-field cron by prepending a seconds field.
pub fn normalize_cron(expr: &str) -> String {
    let expr = expr.trim();
    if expr.split_whitespace().count() == 5 {
        format!("0 {}", expr)
    } else {
        expr.to_string()
    }
}

fn refresh_job(expr: &str, refresh: RefreshCoordinator) -> Result<Job, JobSchedulerError> {
    let schedule = normalize_cron(expr);
    Job::new_async_tz(schedule.as_str(), Local, move |_uuid, _scheduler| {
        let refresh = refresh.clone();
        Box::pin(async move {
            info!("Scheduled refresh starting");
            match refresh.request_refresh().await {
                Ok(RefreshOutcome::Completed { records }) => {
                    info!("Scheduled refresh stored {} records", records)
                }
                Ok(RefreshOutcome::AlreadyRunning) => {
                    info!("Scheduled refresh skipped, one is already running")
                }
                Err(e) => error!("Scheduled refresh failed: {}", e),
            }
        })
    })
}

/// Build the refresh job for `expr`, or for the default schedule if `expr`
/// does not parse. Returns the job and the expression actually used.
pub fn build_refresh_job(
    expr: &str,
    refresh: RefreshCoordinator,
) -> Result<(Job, String), JobSchedulerError> {
    match refresh_job(expr, refresh.clone()) {
        Ok(job) => Ok((job, expr.trim().to_string())),
        Err(e) => {
            warn!(
                "Invalid update schedule '{}' ({}), using default '{}'",
                expr, e, DEFAULT_SCHEDULE
            );
            let job = refresh_job(DEFAULT_SCHEDULE, refresh)?;
            Ok((job, DEFAULT_SCHEDULE.to_string()))
        }
    }
}

/// Start a scheduler running the refresh on `expr`.
pub async fn start_scheduler(
    expr: &str,
    refresh: RefreshCoordinator,
) -> Result<(JobScheduler, String), JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    let (job, schedule) = build_refresh_job(expr, refresh)?;
    scheduler.add(job).await?;
    scheduler.start().await?;
    info!("Refresh scheduled with '{}' (local time)", schedule);
    Ok((scheduler, schedule))
}
