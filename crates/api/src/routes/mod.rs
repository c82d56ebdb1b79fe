pub mod health;
pub mod jobs;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /jobs                 list, submit
/// /jobs/stats           aggregate counters
/// /jobs/{id}            snapshot, cancel (DELETE)
/// /jobs/{id}/result     result payload of a completed job
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/jobs", jobs::router())
}
