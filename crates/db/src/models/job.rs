//! Job entity model and DTOs for the async orchestration engine.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use scriptmark_core::payload::JobType;
use scriptmark_core::types::{DbId, JobId, Timestamp};

use super::status::{JobStatus, StatusId};

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: JobId,
    pub job_type: String,
    pub status_id: StatusId,
    pub owner_id: DbId,
    pub org_id: Option<DbId>,
    pub priority: i32,
    pub progress_pct: i16,
    pub current_step: Option<String>,
    pub input_data: serde_json::Value,
    pub result_data: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub retry_count: i16,
    pub max_retries: i16,
    pub lease_expires_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub expires_at: Timestamp,
}

impl Job {
    /// The status name as exposed by the API (`"queued"`, ...).
    pub fn status_name(&self) -> &'static str {
        JobStatus::from_id(self.status_id).map_or("unknown", JobStatus::name)
    }

    /// Whether the job has reached `completed` or `failed`.
    pub fn is_terminal(&self) -> bool {
        JobStatus::from_id(self.status_id).is_some_and(JobStatus::is_terminal)
    }

    /// Whether the stored result came from the degraded fallback policy.
    pub fn is_degraded(&self) -> bool {
        self.result_data
            .as_ref()
            .and_then(|r| r.get("degraded"))
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }
}

/// Parameters for inserting a new job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub job_type: JobType,
    pub owner_id: DbId,
    pub org_id: Option<DbId>,
    pub priority: i32,
    pub max_retries: i16,
    /// Opaque payload; validated against the typed payload for `job_type`
    /// before it gets here.
    pub input_data: serde_json::Value,
}

/// Repository-level filter for job listings.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status_id: Option<StatusId>,
    pub job_type: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

/// Query parameters for `GET /api/v1/jobs` as sent by clients.
#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    /// Filter by status name (e.g. `queued`, `failed`).
    pub status: Option<String>,
    /// Filter by job type (e.g. `extraction`, `grading`).
    pub job_type: Option<String>,
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}

/// Aggregate counters for `GET /api/v1/jobs/stats`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobStats {
    pub total_jobs: i64,
    pub queued: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub jobs_last_24h: i64,
    /// Mean seconds from `started_at` to `completed_at` over completed jobs.
    pub avg_processing_secs: f64,
}
