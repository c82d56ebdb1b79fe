//! The worker loop: claim, execute, persist.
//!
//! Claims use `SELECT FOR UPDATE SKIP LOCKED` via [`JobRepo::claim_next`]
//! so any number of worker processes can poll the same queue. While a
//! job runs, a heartbeat task keeps extending its lease; every terminal
//! write is compare-and-set on the processing status, so a concurrent
//! cancellation always wins and a late result is simply discarded.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use scriptmark_core::payload::{JobInput, JobType};
use scriptmark_db::models::job::Job;
use scriptmark_db::repositories::JobRepo;
use scriptmark_vision::{Invoker, VisionBackend};

use crate::progress::ProgressReporter;
use crate::tasks::{self, TaskError};

/// Minimum spacing between progress writes for one job.
const PROGRESS_MIN_INTERVAL: Duration = Duration::from_millis(250);

/// Long-lived job execution loop for one worker process.
pub struct WorkerRunner<B> {
    pool: PgPool,
    invoker: Arc<Invoker<B>>,
    poll_interval: Duration,
    lease: Duration,
    heartbeat_interval: Duration,
}

impl<B: VisionBackend + 'static> WorkerRunner<B> {
    pub fn new(
        pool: PgPool,
        invoker: Invoker<B>,
        poll_interval: Duration,
        lease: Duration,
        heartbeat_interval: Duration,
    ) -> Self {
        Self {
            pool,
            invoker: Arc::new(invoker),
            poll_interval,
            lease,
            heartbeat_interval,
        }
    }

    /// Run the worker loop until the cancellation token is triggered.
    ///
    /// A job in flight when shutdown starts is allowed to finish; its
    /// lease covers the window if the process dies instead.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            lease_secs = self.lease.as_secs(),
            "Worker runner started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Worker runner shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    // Drain the queue before going back to sleep.
                    loop {
                        match self.run_once().await {
                            Ok(true) => continue,
                            Ok(false) => break,
                            Err(e) => {
                                tracing::error!(error = %e, "Worker cycle failed");
                                break;
                            }
                        }
                    }
                }
            }
        }
    }

    /// One cycle: claim the next queued job and run it to disposition.
    ///
    /// Returns `Ok(true)` if a job was processed, `Ok(false)` if the
    /// queue was empty.
    pub async fn run_once(&self) -> Result<bool, sqlx::Error> {
        let Some(job) = JobRepo::claim_next(&self.pool, self.lease).await? else {
            return Ok(false);
        };

        tracing::info!(
            job_id = %job.id,
            job_type = %job.job_type,
            retry_count = job.retry_count,
            "Job claimed",
        );
        self.process(job).await?;
        Ok(true)
    }

    async fn process(&self, job: Job) -> Result<(), sqlx::Error> {
        let job_id = job.id;

        // Resolve the opaque payload into its typed form before doing any
        // work. A payload that fails here can never succeed, so the job
        // fails without consuming its retry budget.
        let input = match job
            .job_type
            .parse::<JobType>()
            .and_then(|jt| JobInput::parse(jt, &job.input_data))
        {
            Ok(input) => input,
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Job payload rejected");
                JobRepo::fail(&self.pool, job_id, &e.to_string()).await?;
                return Ok(());
            }
        };

        let heartbeat = tokio::spawn(heartbeat_loop(
            self.pool.clone(),
            job_id,
            self.lease,
            self.heartbeat_interval,
        ));

        let mut progress =
            ProgressReporter::new(self.pool.clone(), job_id, PROGRESS_MIN_INTERVAL);
        let outcome = match &input {
            JobInput::Extraction(input) => {
                tasks::extraction::run(&self.invoker, &mut progress, input).await
            }
            JobInput::Grading(input) => {
                tasks::grading::run(&self.invoker, &mut progress, input).await
            }
        };

        heartbeat.abort();

        match outcome {
            Ok(result) => {
                if JobRepo::complete(&self.pool, job_id, &result).await? {
                    tracing::info!(job_id = %job_id, "Job completed");
                } else {
                    tracing::info!(
                        job_id = %job_id,
                        "Job finished but was no longer processing, result discarded",
                    );
                }
            }
            Err(TaskError::Fatal(msg)) => {
                tracing::error!(job_id = %job_id, error = %msg, "Job failed terminally");
                JobRepo::fail(&self.pool, job_id, &msg).await?;
            }
            Err(TaskError::Retryable(msg)) => {
                if JobRepo::requeue_for_retry(&self.pool, job_id).await? {
                    tracing::warn!(job_id = %job_id, error = %msg, "Job requeued for retry");
                } else if JobRepo::fail(&self.pool, job_id, &msg).await? {
                    tracing::error!(
                        job_id = %job_id,
                        error = %msg,
                        "Job failed, retry budget exhausted",
                    );
                }
            }
        }

        Ok(())
    }
}

/// Keep extending the lease while a job runs.
///
/// Stops on its own if an extension matches no processing row, which
/// means the job was cancelled or reaped out from under us.
async fn heartbeat_loop(
    pool: PgPool,
    job_id: scriptmark_core::types::JobId,
    lease: Duration,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick fires immediately and would re-extend a fresh lease.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        match JobRepo::extend_lease(&pool, job_id, lease).await {
            Ok(true) => {
                tracing::debug!(job_id = %job_id, "Lease extended");
            }
            Ok(false) => {
                tracing::info!(job_id = %job_id, "Lease extension refused, stopping heartbeat");
                break;
            }
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Lease extension failed");
            }
        }
    }
}
