//! Integration tests for the `/api/v1/jobs` surface: submission
//! validation, scoping, snapshots, results, stats, and cancellation.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{body_json, delete_auth, get_auth, post_json, token_for};
use serde_json::json;
use sqlx::PgPool;

use scriptmark_core::roles::ROLE_ADMIN;
use scriptmark_db::repositories::JobRepo;

const LEASE: Duration = Duration::from_secs(60);

fn extraction_body() -> serde_json::Value {
    json!({
        "job_type": "extraction",
        "input_data": {
            "pages": [{ "filename": "p1.png", "image_base64": "aGk=" }]
        }
    })
}

fn grading_body() -> serde_json::Value {
    json!({
        "job_type": "grading",
        "input_data": {
            "pages": [{
                "page_number": 1,
                "filename": "p1.png",
                "handwritten_content": "x = 4",
            }],
            "reference_material": "chapter 4 answer key",
            "student_name": "Ada",
        }
    })
}

// ---------------------------------------------------------------------------
// Test: submission returns 201 with a queued snapshot
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn submit_returns_created_queued_job(pool: PgPool) {
    let app = common::build_test_app(pool);
    let token = token_for(1, Some(10), "teacher");

    let response = post_json(app, "/api/v1/jobs", &token, extraction_body()).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    let job = &json["data"];
    assert_eq!(job["status"], "queued");
    assert_eq!(job["job_type"], "extraction");
    assert_eq!(job["progress_pct"], 0);
    assert_eq!(job["retry_count"], 0);
    assert_eq!(job["max_retries"], 3);
    assert!(job["id"].as_str().unwrap().len() == 36);
    // Pending jobs expose neither result nor error.
    assert!(job.get("result").is_none());
    assert!(job.get("error").is_none());
    assert!(job.get("warning").is_none());
}

// ---------------------------------------------------------------------------
// Test: submission validation
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn submit_rejects_unknown_job_type(pool: PgPool) {
    let app = common::build_test_app(pool);
    let token = token_for(1, None, "teacher");

    let response = post_json(
        app,
        "/api/v1/jobs",
        &token,
        json!({ "job_type": "email", "input_data": {} }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn submit_rejects_empty_page_batch(pool: PgPool) {
    let app = common::build_test_app(pool);
    let token = token_for(1, None, "teacher");

    let response = post_json(
        app,
        "/api/v1/jobs",
        &token,
        json!({ "job_type": "extraction", "input_data": { "pages": [] } }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert!(json["error"].as_str().unwrap().contains("at least one page"));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn submit_clamps_retry_budget(pool: PgPool) {
    let app = common::build_test_app(pool);
    let token = token_for(1, None, "teacher");

    let mut body = extraction_body();
    body["max_retries"] = json!(99);
    let response = post_json(app, "/api/v1/jobs", &token, body).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["max_retries"], 10);
}

// ---------------------------------------------------------------------------
// Test: authentication is required everywhere under /jobs
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn jobs_require_authentication(pool: PgPool) {
    let app = common::build_test_app(pool);

    let response = common::get(app, "/api/v1/jobs").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let json = body_json(response).await;
    assert_eq!(json["code"], "UNAUTHORIZED");
}

// ---------------------------------------------------------------------------
// Test: ownership scoping on single-job reads
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn get_job_enforces_ownership(pool: PgPool) {
    let app = common::build_test_app(pool);
    let owner = token_for(1, None, "teacher");

    let response = post_json(app.clone(), "/api/v1/jobs", &owner, grading_body()).await;
    let job_id = body_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();
    let uri = format!("/api/v1/jobs/{job_id}");

    // The owner sees it.
    let response = get_auth(app.clone(), &uri, &owner).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Another user does not.
    let other = token_for(2, None, "teacher");
    let response = get_auth(app.clone(), &uri, &other).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // An admin does.
    let admin = token_for(3, None, ROLE_ADMIN);
    let response = get_auth(app.clone(), &uri, &admin).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Unknown ids are 404, not 403.
    let response = get_auth(
        app,
        "/api/v1/jobs/00000000-0000-0000-0000-000000000000",
        &other,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: listing scopes, filters, and counts
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn list_jobs_scopes_and_filters(pool: PgPool) {
    let app = common::build_test_app(pool);
    let user1 = token_for(1, None, "teacher");
    let user2 = token_for(2, None, "teacher");

    post_json(app.clone(), "/api/v1/jobs", &user1, extraction_body()).await;
    post_json(app.clone(), "/api/v1/jobs", &user1, grading_body()).await;
    post_json(app.clone(), "/api/v1/jobs", &user2, extraction_body()).await;

    // Users see only their own jobs.
    let json = body_json(get_auth(app.clone(), "/api/v1/jobs", &user1).await).await;
    assert_eq!(json["data"]["total"], 2);
    assert_eq!(json["data"]["jobs"].as_array().unwrap().len(), 2);
    assert_eq!(json["data"]["limit"], 50);

    // Admins see everything.
    let admin = token_for(9, None, ROLE_ADMIN);
    let json = body_json(get_auth(app.clone(), "/api/v1/jobs", &admin).await).await;
    assert_eq!(json["data"]["total"], 3);

    // Type filter.
    let json = body_json(
        get_auth(app.clone(), "/api/v1/jobs?job_type=grading", &user1).await,
    )
    .await;
    assert_eq!(json["data"]["total"], 1);
    assert_eq!(json["data"]["jobs"][0]["job_type"], "grading");

    // Pagination returns a page but the full count.
    let json = body_json(
        get_auth(app.clone(), "/api/v1/jobs?limit=1&offset=0", &admin).await,
    )
    .await;
    assert_eq!(json["data"]["jobs"].as_array().unwrap().len(), 1);
    assert_eq!(json["data"]["total"], 3);

    // Bad status filter is rejected.
    let response = get_auth(app, "/api/v1/jobs?status=cancelled", &user1).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Test: result endpoint gates on completion
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn job_result_is_gated_on_completion(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let token = token_for(1, None, "teacher");

    let response = post_json(app.clone(), "/api/v1/jobs", &token, grading_body()).await;
    let job_id = body_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();
    let uri = format!("/api/v1/jobs/{job_id}/result");

    // Still queued: no result yet.
    let response = get_auth(app.clone(), &uri, &token).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "JOB_NOT_COMPLETED");

    // Complete the job through the worker path.
    let claimed = JobRepo::claim_next(&pool, LEASE).await.unwrap().unwrap();
    let result = json!({ "total_mark": 17.5, "degraded": false });
    JobRepo::complete(&pool, claimed.id, &result).await.unwrap();

    let response = get_auth(app.clone(), &uri, &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"], result);

    // The snapshot now carries the result inline too.
    let json = body_json(
        get_auth(app, &format!("/api/v1/jobs/{job_id}"), &token).await,
    )
    .await;
    assert_eq!(json["data"]["status"], "completed");
    assert_eq!(json["data"]["result"]["total_mark"], 17.5);
    assert!(json["data"].get("warning").is_none());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn degraded_results_carry_a_warning(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let token = token_for(1, None, "teacher");

    let response = post_json(app.clone(), "/api/v1/jobs", &token, grading_body()).await;
    let job_id = body_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let claimed = JobRepo::claim_next(&pool, LEASE).await.unwrap().unwrap();
    JobRepo::complete(&pool, claimed.id, &json!({ "total_mark": 5.0, "degraded": true }))
        .await
        .unwrap();

    let json = body_json(
        get_auth(app, &format!("/api/v1/jobs/{job_id}"), &token).await,
    )
    .await;
    assert_eq!(json["data"]["warning"], true);
}

// ---------------------------------------------------------------------------
// Test: cancellation
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn cancel_job_is_rejected_once_terminal(pool: PgPool) {
    let app = common::build_test_app(pool);
    let token = token_for(1, None, "teacher");

    let response = post_json(app.clone(), "/api/v1/jobs", &token, extraction_body()).await;
    let job_id = body_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();
    let uri = format!("/api/v1/jobs/{job_id}");

    // First cancel succeeds and returns the updated snapshot.
    let response = delete_auth(app.clone(), &uri, &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "failed");
    assert_eq!(json["data"]["error"], "Job canceled by user");

    // A second cancel hits a terminal job.
    let response = delete_auth(app.clone(), &uri, &token).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Other users cannot cancel someone else's job.
    let other = token_for(2, None, "teacher");
    let response = delete_auth(app, &uri, &other).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Test: stats counters
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn stats_reports_scoped_counters(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let token = token_for(1, None, "teacher");

    post_json(app.clone(), "/api/v1/jobs", &token, extraction_body()).await;
    post_json(app.clone(), "/api/v1/jobs", &token, grading_body()).await;

    let claimed = JobRepo::claim_next(&pool, LEASE).await.unwrap().unwrap();
    JobRepo::complete(&pool, claimed.id, &json!({})).await.unwrap();

    let json = body_json(get_auth(app.clone(), "/api/v1/jobs/stats", &token).await).await;
    let stats = &json["data"];
    assert_eq!(stats["total_jobs"], 2);
    assert_eq!(stats["queued"], 1);
    assert_eq!(stats["completed"], 1);
    assert_eq!(stats["failed"], 0);
    assert_eq!(stats["jobs_last_24h"], 2);

    // Another user's scope is empty.
    let other = token_for(2, None, "teacher");
    let json = body_json(get_auth(app, "/api/v1/jobs/stats", &other).await).await;
    assert_eq!(json["data"]["total_jobs"], 0);
}
