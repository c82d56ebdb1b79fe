//! Handlers for the `/jobs` resource.
//!
//! All endpoints require authentication via [`AuthUser`]. Admin users
//! operate on all jobs; regular users see only their own. Submission
//! validates the payload against the typed form for its job type before
//! anything is persisted.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use scriptmark_core::error::CoreError;
use scriptmark_core::payload::{JobInput, JobType};
use scriptmark_core::roles::ROLE_ADMIN;
use scriptmark_core::types::{JobId, Timestamp};
use scriptmark_db::models::job::{Job, JobFilter, JobListQuery, NewJob};
use scriptmark_db::models::status::JobStatus;
use scriptmark_db::repositories::JobRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Maximum page size for job listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for job listing.
const DEFAULT_LIMIT: i64 = 50;

/// Default retry budget for submitted jobs.
const DEFAULT_MAX_RETRIES: i16 = 3;

/// Upper bound a submitter may set for the retry budget.
const MAX_MAX_RETRIES: i16 = 10;

const CANCEL_REASON: &str = "Job canceled by user";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Body of `POST /api/v1/jobs`.
#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    pub job_type: String,
    pub input_data: serde_json::Value,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub max_retries: Option<i16>,
}

/// Client-facing snapshot of one job.
///
/// `result` appears only on completed jobs, `error` only on failed
/// ones, and `warning` only when the result came from the degraded
/// fallback policy.
#[derive(Debug, Serialize)]
pub struct JobView {
    pub id: JobId,
    pub job_type: String,
    pub status: &'static str,
    pub progress_pct: i16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    pub retry_count: i16,
    pub max_retries: i16,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub expires_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub warning: bool,
}

impl From<Job> for JobView {
    fn from(job: Job) -> Self {
        let completed = job.status_id == JobStatus::Completed.id();
        let failed = job.status_id == JobStatus::Failed.id();
        let warning = job.is_degraded();
        Self {
            id: job.id,
            status: job.status_name(),
            job_type: job.job_type,
            progress_pct: job.progress_pct,
            current_step: job.current_step,
            retry_count: job.retry_count,
            max_retries: job.max_retries,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            expires_at: job.expires_at,
            result: if completed { job.result_data } else { None },
            error: if failed { job.error_message } else { None },
            warning,
        }
    }
}

/// Response body of `GET /api/v1/jobs`.
#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobView>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fetch a job by ID and verify the caller owns it (or is admin).
///
/// Returns `NotFound` if the job does not exist, `Forbidden` if the
/// caller is not the owner and is not an admin. `action` is used in the
/// error message (e.g. "view", "cancel").
async fn find_and_authorize(
    pool: &sqlx::PgPool,
    job_id: JobId,
    auth: &AuthUser,
    action: &str,
) -> AppResult<Job> {
    let job = JobRepo::find_by_id(pool, job_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: job_id.to_string(),
        }))?;

    if job.owner_id != auth.user_id && auth.role != ROLE_ADMIN {
        return Err(AppError::Core(CoreError::Forbidden(format!(
            "Cannot {action} another user's job"
        ))));
    }

    Ok(job)
}

/// Resolve list query parameters into a repository filter.
fn build_filter(params: &JobListQuery) -> AppResult<JobFilter> {
    let status_id = match &params.status {
        Some(name) => Some(
            JobStatus::from_name(name)
                .ok_or_else(|| {
                    AppError::BadRequest(format!("Unknown status filter: {name}"))
                })?
                .id(),
        ),
        None => None,
    };

    let job_type = match &params.job_type {
        Some(jt) => Some(jt.parse::<JobType>().map(|jt| jt.as_str().to_string())?),
        None => None,
    };

    Ok(JobFilter {
        status_id,
        job_type,
        limit: params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        offset: params.offset.unwrap_or(0).max(0),
    })
}

/// Scope for list/stats queries: admins see everything.
fn owner_scope(auth: &AuthUser) -> Option<scriptmark_core::types::DbId> {
    if auth.role == ROLE_ADMIN {
        None
    } else {
        Some(auth.user_id)
    }
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Submit a new background job. The payload is validated against the
/// typed form for its `job_type` before the row is inserted; the insert
/// itself is the enqueue, so a created job is always claimable. Returns
/// 201 with the queued job snapshot.
pub async fn submit_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<SubmitJobRequest>,
) -> AppResult<impl IntoResponse> {
    let job_type: JobType = body.job_type.parse()?;
    JobInput::parse(job_type, &body.input_data)?;

    let input = NewJob {
        job_type,
        owner_id: auth.user_id,
        org_id: auth.org_id,
        priority: body.priority.unwrap_or(0),
        max_retries: body
            .max_retries
            .unwrap_or(DEFAULT_MAX_RETRIES)
            .clamp(0, MAX_MAX_RETRIES),
        input_data: body.input_data,
    };
    let job = JobRepo::create(&state.pool, &input, state.config.job_retention).await?;

    tracing::info!(
        job_id = %job.id,
        job_type = %job.job_type,
        user_id = auth.user_id,
        "Job submitted",
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse { data: JobView::from(job) }),
    ))
}

// ---------------------------------------------------------------------------
// List / stats
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
///
/// List jobs, newest first. Admin users see all jobs; regular users see
/// only their own. Supports `status`, `job_type`, `limit`, and `offset`
/// query parameters; the response carries the total count matching the
/// filters.
pub async fn list_jobs(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<JobListQuery>,
) -> AppResult<impl IntoResponse> {
    let filter = build_filter(&params)?;
    let (jobs, total) =
        JobRepo::list(&state.pool, owner_scope(&auth), &filter).await?;

    Ok(Json(DataResponse {
        data: JobListResponse {
            jobs: jobs.into_iter().map(JobView::from).collect(),
            total,
            limit: filter.limit,
            offset: filter.offset,
        },
    }))
}

/// GET /api/v1/jobs/stats
///
/// Aggregate job counters: per-status counts, jobs created in the last
/// 24 hours, and mean processing time over completed jobs. Scoped to
/// the caller unless they are an admin.
pub async fn job_stats(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let stats = JobRepo::stats(&state.pool, owner_scope(&auth)).await?;
    Ok(Json(DataResponse { data: stats }))
}

// ---------------------------------------------------------------------------
// Get / result
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}
///
/// Get a single job snapshot. Users can only view their own jobs;
/// admins can view any job.
pub async fn get_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = find_and_authorize(&state.pool, job_id, &auth, "view").await?;
    Ok(Json(DataResponse { data: JobView::from(job) }))
}

/// GET /api/v1/jobs/{id}/result
///
/// Fetch just the result payload of a completed job. Any other status
/// is a 400 with code `JOB_NOT_COMPLETED`.
pub async fn get_job_result(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = find_and_authorize(&state.pool, job_id, &auth, "view").await?;

    if job.status_id != JobStatus::Completed.id() {
        return Err(AppError::JobNotCompleted(job.status_name().to_string()));
    }
    let result = job.result_data.ok_or_else(|| {
        AppError::InternalError(format!("Completed job {job_id} has no result payload"))
    })?;

    Ok(Json(DataResponse { data: result }))
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

/// DELETE /api/v1/jobs/{id}
///
/// Cooperatively cancel a queued or processing job. Cancellation lands
/// in `failed` with a cancellation reason; a worker mid-flight keeps
/// running but its terminal writes will not stick. 400 if the job is
/// already terminal.
pub async fn cancel_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = find_and_authorize(&state.pool, job_id, &auth, "cancel").await?;

    if !JobRepo::cancel(&state.pool, job_id, CANCEL_REASON).await? {
        return Err(AppError::BadRequest(format!(
            "Cannot cancel a job that is already {}",
            job.status_name()
        )));
    }

    tracing::info!(job_id = %job_id, user_id = auth.user_id, "Job cancelled");

    let job = JobRepo::find_by_id(&state.pool, job_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: job_id.to_string(),
        }))?;
    Ok(Json(DataResponse { data: JobView::from(job) }))
}
