//! Scheduled expiry sweep

use chrono::Utc;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};

use super::TripService;

/// Register and start the expiry sweep on `cron` (six fields, seconds first).
///
/// The returned scheduler must be kept alive for the job to keep running.
pub async fn start_expiry_sweep(
    trip_service: Arc<TripService>,
    cron: &str,
) -> anyhow::Result<JobScheduler> {
    tracing::info!(schedule = cron, "Starting trip expiry sweep");

    let scheduler = JobScheduler::new()
        .await
        .map_err(|e| anyhow::anyhow!("failed to create scheduler: {:?}", e))?;

    let job = Job::new_async(cron, move |_id, _scheduler| {
        let trip_service = trip_service.clone();
        Box::pin(async move {
            match trip_service.run_expiry_sweep(Utc::now()).await {
                Ok(expired) if expired.is_empty() => {
                    tracing::debug!("Expiry sweep found no departed trips");
                }
                Ok(expired) => {
                    tracing::info!(count = expired.len(), "Expired departed unbooked trips");
                }
                Err(e) => {
                    tracing::error!("Error running expiry sweep: {}", e);
                }
            }
        })
    })
    .map_err(|e| anyhow::anyhow!("invalid expiry sweep schedule {:?}: {:?}", cron, e))?;

    scheduler
        .add(job)
        .await
        .map_err(|e| anyhow::anyhow!("failed to register expiry sweep: {:?}", e))?;
    scheduler
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("failed to start scheduler: {:?}", e))?;

    Ok(scheduler)
}
