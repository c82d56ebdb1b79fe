//! Periodic cleanup of expired terminal jobs.
//!
//! Jobs carry their own retention deadline (`expires_at`, fixed at
//! submission); this loop deletes completed and failed jobs past it.
//! Active jobs are never touched, however old.

use std::time::Duration;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use scriptmark_db::repositories::JobRepo;

/// How often the cleanup job runs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(3600); // 1 hour

/// Run the retention cleanup loop until `cancel` is triggered.
pub async fn run(pool: PgPool, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = SWEEP_INTERVAL.as_secs(),
        "Job retention sweep started",
    );

    let mut interval = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Job retention sweep stopping");
                break;
            }
            _ = interval.tick() => {
                match JobRepo::delete_expired(&pool).await {
                    Ok(deleted) => {
                        if deleted > 0 {
                            tracing::info!(deleted, "Retention sweep: purged expired jobs");
                        } else {
                            tracing::debug!("Retention sweep: nothing to purge");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Retention sweep failed");
                    }
                }
            }
        }
    }
}
