//! HTTP-level integration tests for validation runs: single property,
//! explicit parcel lists, and the full-roll background job surface.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use axum::Router;
use common::{body_json, build_test_app, get, post_empty, post_json, seed_property};
use serde_json::json;

async fn create_non_negative_rule(app: Router) {
    let response = post_json(
        app,
        "/api/v1/validation/rules",
        json!({
            "code": "R1",
            "name": "Assessed value non-negative",
            "category": "regulatory",
            "severity": "error",
            "check": { "kind": "non_negative", "params": { "field": "assessed_value" } }
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

/// Poll a job until it reaches a terminal state.
async fn wait_for_job(app: Router, job_id: &str) -> serde_json::Value {
    for _ in 0..200 {
        let response = get(app.clone(), &format!("/api/v1/validation/jobs/{job_id}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let state = json["data"]["state"].as_str().unwrap().to_string();
        if state != "pending" && state != "running" {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {job_id} never finished");
}

// ---------------------------------------------------------------------------
// Test: single-property run returns the full report shape
// ---------------------------------------------------------------------------

#[tokio::test]
async fn single_property_run_returns_report() {
    let (app, store) = build_test_app();
    create_non_negative_rule(app.clone()).await;
    seed_property(&store, "123456-789", -500).await;

    let response = post_empty(app, "/api/v1/validation/properties/123456-789/run").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let data = &json["data"];
    assert_eq!(data["parcel_number"], "123456-789");
    assert_eq!(data["is_valid"], false);
    assert_eq!(data["issue_count"], 1);
    let issues = data["issues"].as_array().unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0]["rule_code"], "R1");
    assert!(issues[0]["message"].as_str().unwrap().contains("-500"));
}

// ---------------------------------------------------------------------------
// Test: running against an unknown parcel returns 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_unknown_parcel_returns_404() {
    let (app, _) = build_test_app();
    create_non_negative_rule(app.clone()).await;

    let response = post_empty(app, "/api/v1/validation/properties/000000-000/run").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: explicit parcel list run returns a batch summary
// ---------------------------------------------------------------------------

#[tokio::test]
async fn parcel_list_run_returns_summary() {
    let (app, store) = build_test_app();
    create_non_negative_rule(app.clone()).await;
    seed_property(&store, "P1", 100).await;
    seed_property(&store, "P2", -7).await;

    let response = post_json(
        app,
        "/api/v1/validation/run",
        json!({ "parcel_numbers": ["P1", "P2"] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let data = &json["data"];
    assert_eq!(data["total"], 2);
    assert_eq!(data["valid"], 1);
    assert_eq!(data["invalid"], 1);
    assert_eq!(data["new_issue_count"], 1);
}

// ---------------------------------------------------------------------------
// Test: run-all returns a job id immediately and completes correctly
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_all_returns_job_id_and_completes() {
    let (app, store) = build_test_app();
    create_non_negative_rule(app.clone()).await;
    for i in 0..5 {
        seed_property(&store, &format!("P{i}"), if i == 0 { -1 } else { 100 }).await;
    }

    let response = post_empty(app.clone(), "/api/v1/validation/run-all").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "running");
    let job_id = json["data"]["job_id"].as_str().unwrap().to_string();

    let snapshot = wait_for_job(app, &job_id).await;
    assert_eq!(snapshot["data"]["state"], "completed");
    assert_eq!(snapshot["data"]["processed"], 5);
    let summary = &snapshot["data"]["summary"];
    assert_eq!(summary["total"], 5);
    assert_eq!(summary["valid"], 4);
    assert_eq!(summary["invalid"], 1);
}

// ---------------------------------------------------------------------------
// Test: unknown job id returns 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_job_returns_404() {
    let (app, _) = build_test_app();
    let response = get(
        app,
        "/api/v1/validation/jobs/00000000-0000-0000-0000-000000000000",
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
