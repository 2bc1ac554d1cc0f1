//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers one
//! recurring dispatch job per tier, each on that tier's cron expression.

use std::sync::Arc;

use cadence_worker::TierScheduler;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process. Dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a tier's cron expression is rejected, or the scheduler fails to start.
pub async fn build_scheduler(
    tier_scheduler: Arc<TierScheduler>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    let tiers: Vec<(String, String)> = tier_scheduler
        .tiers()
        .iter()
        .map(|t| (t.key.clone(), t.cron.clone()))
        .collect();

    for (tier, cron) in tiers {
        register_tier_job(&scheduler, Arc::clone(&tier_scheduler), tier, &cron).await?;
    }

    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the recurring tick for one tier.
///
/// A tick failure is logged and the next firing proceeds normally; other
/// tiers are never affected.
async fn register_tier_job(
    scheduler: &JobScheduler,
    tier_scheduler: Arc<TierScheduler>,
    tier: String,
    cron: &str,
) -> Result<(), JobSchedulerError> {
    let tier: Arc<str> = tier.into();
    let job_tier = Arc::clone(&tier);

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let tier_scheduler = Arc::clone(&tier_scheduler);
        let tier = Arc::clone(&job_tier);

        Box::pin(async move {
            tracing::info!(tier = %tier, "scheduler: starting tier tick");
            match tier_scheduler.tick(&tier).await {
                Ok(report) => tracing::info!(
                    tier = %tier,
                    listed = report.listed,
                    due = report.due,
                    succeeded = report.succeeded,
                    failed = report.failed,
                    "scheduler: tier tick complete"
                ),
                Err(e) => tracing::error!(tier = %tier, error = %e, "scheduler: tier tick aborted"),
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(tier = %tier, cron, "scheduler: registered tier job");
    Ok(())
}
