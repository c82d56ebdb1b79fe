//! Progress reporting for running task bodies.

use std::time::{Duration, Instant};

use sqlx::PgPool;

use scriptmark_core::types::JobId;
use scriptmark_db::repositories::JobRepo;

/// Reports progress for one claimed job.
///
/// Reports are best-effort: a database hiccup is logged and swallowed
/// rather than failing the job. Writes are throttled to at most one per
/// `min_interval` (100% always goes through), duplicates and backwards
/// reports are dropped client-side, and the repository enforces
/// monotonicity again on the server side.
pub struct ProgressReporter {
    pool: PgPool,
    job_id: JobId,
    min_interval: Duration,
    last_pct: i16,
    last_sent: Option<Instant>,
    owned: bool,
}

impl ProgressReporter {
    pub fn new(pool: PgPool, job_id: JobId, min_interval: Duration) -> Self {
        Self {
            pool,
            job_id,
            min_interval,
            last_pct: 0,
            last_sent: None,
            owned: true,
        }
    }

    /// Record progress. Returns whether the job is still ours: a report
    /// that matches no processing row means the job was cancelled or
    /// reaped, and the task body should stop working on it.
    pub async fn report(&mut self, pct: i16, step: &str) -> bool {
        if !self.owned {
            return false;
        }
        let pct = pct.clamp(0, 100);
        if pct <= self.last_pct {
            return true;
        }
        if pct < 100 {
            if let Some(sent) = self.last_sent {
                if sent.elapsed() < self.min_interval {
                    return true;
                }
            }
        }

        match JobRepo::update_progress(&self.pool, self.job_id, pct, Some(step)).await {
            Ok(true) => {
                self.last_pct = pct;
                self.last_sent = Some(Instant::now());
                true
            }
            Ok(false) => {
                tracing::info!(
                    job_id = %self.job_id,
                    "Progress report matched no processing row, claim revoked",
                );
                self.owned = false;
                false
            }
            Err(e) => {
                tracing::warn!(job_id = %self.job_id, error = %e, "Progress report failed");
                true
            }
        }
    }
}
