//! Repository for the `jobs` table.
//!
//! All state transitions go through `JobStatus` from `models::status`;
//! no status literal appears outside the enum. Terminal transitions are
//! compare-and-set on `status_id` so a concurrent cancellation is never
//! overwritten by a late worker.

use std::time::Duration;

use sqlx::PgPool;
use uuid::Uuid;

use scriptmark_core::types::{DbId, JobId};

use crate::models::job::{Job, JobFilter, JobStats, NewJob};
use crate::models::status::JobStatus;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, job_type, status_id, owner_id, org_id, priority, \
    progress_pct, current_step, input_data, result_data, error_message, \
    retry_count, max_retries, lease_expires_at, \
    created_at, started_at, completed_at, expires_at";

/// Provides lifecycle operations for background jobs.
pub struct JobRepo;

impl JobRepo {
    /// Insert a new queued job. The single INSERT is both the persisted
    /// record and the queue entry, so a job is never enqueued without a
    /// matching row (or vice versa).
    ///
    /// `retention` controls `expires_at`, after which a terminal job is
    /// eligible for the retention sweep.
    pub async fn create(
        pool: &PgPool,
        input: &NewJob,
        retention: Duration,
    ) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs \
                 (id, job_type, status_id, owner_id, org_id, priority, \
                  max_retries, input_data, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, \
                     NOW() + make_interval(secs => $9)) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(Uuid::new_v4())
            .bind(input.job_type.as_str())
            .bind(JobStatus::Queued.id())
            .bind(input.owner_id)
            .bind(input.org_id)
            .bind(input.priority)
            .bind(input.max_retries)
            .bind(&input.input_data)
            .bind(retention.as_secs_f64())
            .fetch_one(pool)
            .await
    }

    /// Atomically claim the next queued job for a worker.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so concurrent workers never
    /// double-claim. The claim takes a lease; if the worker dies without
    /// finishing, `requeue_stale` returns the job to the queue once the
    /// lease expires.
    ///
    /// `started_at` is set only on the first claim so processing duration
    /// spans retries.
    pub async fn claim_next(
        pool: &PgPool,
        lease: Duration,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs \
             SET status_id = $1, \
                 started_at = COALESCE(started_at, NOW()), \
                 error_message = NULL, \
                 lease_expires_at = NOW() + make_interval(secs => $2) \
             WHERE id = ( \
                 SELECT id FROM jobs \
                 WHERE status_id = $3 \
                 ORDER BY priority DESC, created_at ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(JobStatus::Processing.id())
            .bind(lease.as_secs_f64())
            .bind(JobStatus::Queued.id())
            .fetch_optional(pool)
            .await
    }

    /// Update progress on a processing job.
    ///
    /// Progress is monotone: `GREATEST` rejects regressions, and the
    /// status guard means a late report against a cancelled or completed
    /// job is a no-op. Returns whether a row was updated.
    pub async fn update_progress(
        pool: &PgPool,
        job_id: JobId,
        pct: i16,
        step: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs \
             SET progress_pct = GREATEST(progress_pct, $2), current_step = $3 \
             WHERE id = $1 AND status_id = $4",
        )
        .bind(job_id)
        .bind(pct)
        .bind(step)
        .bind(JobStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Push the lease forward for a job still being worked on.
    ///
    /// Returns `false` when the job is no longer processing, which tells
    /// the worker its claim has been revoked (cancelled or reaped).
    pub async fn extend_lease(
        pool: &PgPool,
        job_id: JobId,
        lease: Duration,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs \
             SET lease_expires_at = NOW() + make_interval(secs => $2) \
             WHERE id = $1 AND status_id = $3",
        )
        .bind(job_id)
        .bind(lease.as_secs_f64())
        .bind(JobStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a processing job completed with its result payload.
    ///
    /// Compare-and-set on `status_id = processing`: returns `false` if the
    /// job was cancelled (or otherwise moved) while the worker ran, in
    /// which case the result is discarded.
    pub async fn complete(
        pool: &PgPool,
        job_id: JobId,
        result_data: &serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs \
             SET status_id = $2, result_data = $3, progress_pct = 100, \
                 completed_at = NOW(), lease_expires_at = NULL \
             WHERE id = $1 AND status_id = $4",
        )
        .bind(job_id)
        .bind(JobStatus::Completed.id())
        .bind(result_data)
        .bind(JobStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a processing job failed with an error message.
    ///
    /// Same compare-and-set guard as [`complete`](Self::complete).
    pub async fn fail(
        pool: &PgPool,
        job_id: JobId,
        error: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs \
             SET status_id = $2, error_message = $3, \
                 completed_at = NOW(), lease_expires_at = NULL \
             WHERE id = $1 AND status_id = $4",
        )
        .bind(job_id)
        .bind(JobStatus::Failed.id())
        .bind(error)
        .bind(JobStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Return a processing job to the queue for another attempt.
    ///
    /// Increments `retry_count` and only succeeds while the retry budget
    /// holds (`retry_count < max_retries`). Returns `false` when the
    /// budget is exhausted; the caller should then `fail` the job.
    pub async fn requeue_for_retry(
        pool: &PgPool,
        job_id: JobId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs \
             SET status_id = $2, retry_count = retry_count + 1, \
                 lease_expires_at = NULL \
             WHERE id = $1 AND status_id = $3 AND retry_count < max_retries",
        )
        .bind(job_id)
        .bind(JobStatus::Queued.id())
        .bind(JobStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Cancel a queued or processing job.
    ///
    /// Cancellation lands in `failed` with the given reason. Returns
    /// `false` if the job already reached a terminal state, which the API
    /// reports as a conflict.
    pub async fn cancel(
        pool: &PgPool,
        job_id: JobId,
        reason: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs \
             SET status_id = $2, error_message = $3, \
                 completed_at = NOW(), lease_expires_at = NULL \
             WHERE id = $1 AND status_id IN ($4, $5)",
        )
        .bind(job_id)
        .bind(JobStatus::Failed.id())
        .bind(reason)
        .bind(JobStatus::Queued.id())
        .bind(JobStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Return all processing jobs whose lease has lapsed to the queue.
    ///
    /// A lapsed lease means the worker died mid-job; this does not count
    /// against the retry budget since the attempt never reported an error.
    /// Returns the number of jobs requeued.
    pub async fn requeue_stale(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs \
             SET status_id = $1, lease_expires_at = NULL \
             WHERE status_id = $2 AND lease_expires_at < NOW()",
        )
        .bind(JobStatus::Queued.id())
        .bind(JobStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete terminal jobs past their retention deadline.
    ///
    /// Returns the number of rows removed.
    pub async fn delete_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM jobs \
             WHERE status_id IN ($1, $2) AND expires_at < NOW()",
        )
        .bind(JobStatus::Completed.id())
        .bind(JobStatus::Failed.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Find a job by its ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: JobId,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List jobs with filters and pagination, newest first.
    ///
    /// When `owner_id` is `Some`, filters to that user's jobs; `None` is
    /// the admin view. Returns the page together with the total count
    /// matching the filters.
    pub async fn list(
        pool: &PgPool,
        owner_id: Option<DbId>,
        filter: &JobFilter,
    ) -> Result<(Vec<Job>, i64), sqlx::Error> {
        // Build the WHERE clause and track the next bind parameter index.
        let mut conditions: Vec<String> = Vec::new();
        let mut bind_idx: u32 = 1;

        if owner_id.is_some() {
            conditions.push(format!("owner_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.status_id.is_some() {
            conditions.push(format!("status_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.job_type.is_some() {
            conditions.push(format!("job_type = ${bind_idx}"));
            bind_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_query = format!("SELECT COUNT(*) FROM jobs {where_clause}");
        let mut cq = sqlx::query_scalar::<_, i64>(&count_query);
        if let Some(uid) = owner_id {
            cq = cq.bind(uid);
        }
        if let Some(sid) = filter.status_id {
            cq = cq.bind(sid);
        }
        if let Some(jt) = &filter.job_type {
            cq = cq.bind(jt);
        }
        let total = cq.fetch_one(pool).await?;

        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             {where_clause} \
             ORDER BY created_at DESC \
             LIMIT ${bind_idx} OFFSET ${}",
            bind_idx + 1,
        );
        let mut q = sqlx::query_as::<_, Job>(&query);
        if let Some(uid) = owner_id {
            q = q.bind(uid);
        }
        if let Some(sid) = filter.status_id {
            q = q.bind(sid);
        }
        if let Some(jt) = &filter.job_type {
            q = q.bind(jt);
        }
        q = q.bind(filter.limit).bind(filter.offset);

        let jobs = q.fetch_all(pool).await?;
        Ok((jobs, total))
    }

    /// Aggregate job counters, scoped to one owner or global for admins.
    pub async fn stats(
        pool: &PgPool,
        owner_id: Option<DbId>,
    ) -> Result<JobStats, sqlx::Error> {
        let scope = if owner_id.is_some() {
            "WHERE owner_id = $5"
        } else {
            ""
        };
        let query = format!(
            "SELECT \
                 COUNT(*) AS total_jobs, \
                 COUNT(*) FILTER (WHERE status_id = $1) AS queued, \
                 COUNT(*) FILTER (WHERE status_id = $2) AS processing, \
                 COUNT(*) FILTER (WHERE status_id = $3) AS completed, \
                 COUNT(*) FILTER (WHERE status_id = $4) AS failed, \
                 COUNT(*) FILTER (WHERE created_at > NOW() - INTERVAL '24 hours') \
                     AS jobs_last_24h, \
                 COALESCE(AVG(EXTRACT(EPOCH FROM completed_at - started_at)) \
                     FILTER (WHERE status_id = $3 AND started_at IS NOT NULL), \
                     0)::DOUBLE PRECISION AS avg_processing_secs \
             FROM jobs {scope}"
        );
        let mut q = sqlx::query_as::<_, JobStats>(&query)
            .bind(JobStatus::Queued.id())
            .bind(JobStatus::Processing.id())
            .bind(JobStatus::Completed.id())
            .bind(JobStatus::Failed.id());
        if let Some(uid) = owner_id {
            q = q.bind(uid);
        }
        q.fetch_one(pool).await
    }
}
