//! Route definitions for the `/jobs` resource.
//!
//! All endpoints require authentication.

use axum::routing::get;
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// GET    /                -> list_jobs
/// POST   /                -> submit_job
/// GET    /stats           -> job_stats
/// GET    /{id}            -> get_job
/// DELETE /{id}            -> cancel_job
/// GET    /{id}/result     -> get_job_result
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(jobs::list_jobs).post(jobs::submit_job))
        .route("/stats", get(jobs::job_stats))
        .route("/{id}", get(jobs::get_job).delete(jobs::cancel_job))
        .route("/{id}/result", get(jobs::get_job_result))
}
