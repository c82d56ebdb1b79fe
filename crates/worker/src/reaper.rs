//! Stale-lease reaper.
//!
//! A worker that dies mid-job leaves its claim behind with a lease that
//! stops being extended. This loop returns such jobs to the queue so
//! another worker can pick them up. Requeueing this way does not touch
//! the retry budget: the attempt never reported a failure.

use std::time::Duration;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use scriptmark_db::repositories::JobRepo;

/// How often expired leases are checked.
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Run the reaper loop until `cancel` is triggered.
pub async fn run(pool: PgPool, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = SWEEP_INTERVAL.as_secs(),
        "Lease reaper started",
    );

    let mut interval = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Lease reaper stopping");
                break;
            }
            _ = interval.tick() => {
                match JobRepo::requeue_stale(&pool).await {
                    Ok(requeued) if requeued > 0 => {
                        tracing::warn!(requeued, "Requeued jobs with expired leases");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!(error = %e, "Lease sweep failed");
                    }
                }
            }
        }
    }
}
