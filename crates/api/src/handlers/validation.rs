//! Handlers for the `/validation` resource.
//!
//! Rule catalog administration (CRUD minus DELETE; rules deactivate via
//! PATCH), synchronous validation of one property or an explicit parcel
//! list, and the full-roll background job surface.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use taxroll_core::validation::rules::{NewRule, RuleCategory, RuleFilter, RulePatch, ValidationRule};
use taxroll_engine::jobs::JobSnapshot;
use taxroll_engine::runner::{BatchSummary, PropertyReport, RunOptions};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

// ── Rule catalog admin ───────────────────────────────────────────────

/// Query parameters for listing validation rules.
#[derive(Debug, Deserialize)]
pub struct ListRulesParams {
    pub category: Option<String>,
    pub entity_type: Option<String>,
    #[serde(default)]
    pub active_only: bool,
}

/// GET /api/v1/validation/rules?category=X&entity_type=Y&active_only=true
pub async fn list_rules(
    State(state): State<AppState>,
    Query(params): Query<ListRulesParams>,
) -> AppResult<Json<DataResponse<Vec<ValidationRule>>>> {
    let category = params
        .category
        .as_deref()
        .map(RuleCategory::from_str)
        .transpose()?;
    let filter = RuleFilter {
        category,
        entity_type: params.entity_type,
        active_only: params.active_only,
    };
    let rules = state.catalog.list_rules(&filter).await?;
    Ok(Json(DataResponse { data: rules }))
}

/// POST /api/v1/validation/rules
///
/// Register a new rule. The check definition is validated before
/// anything is stored: an unknown kind, field, or parameter shape is a
/// 422. A duplicate code is a 409. Returns the created rule with 201.
pub async fn create_rule(
    State(state): State<AppState>,
    Json(input): Json<NewRule>,
) -> AppResult<(StatusCode, Json<DataResponse<ValidationRule>>)> {
    let rule = state.catalog.register_rule(input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: rule })))
}

/// GET /api/v1/validation/rules/{code}
pub async fn get_rule(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> AppResult<Json<DataResponse<ValidationRule>>> {
    let rule = state.catalog.get_rule(&code).await?;
    Ok(Json(DataResponse { data: rule }))
}

/// PATCH /api/v1/validation/rules/{code}
///
/// Partial update; `code` is immutable. Deactivation (`is_active: false`)
/// is the supported way to retire a rule -- there is no DELETE.
pub async fn update_rule(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(patch): Json<RulePatch>,
) -> AppResult<Json<DataResponse<ValidationRule>>> {
    let rule = state.catalog.update_rule(&code, &patch).await?;
    Ok(Json(DataResponse { data: rule }))
}

// ── Validation runs ──────────────────────────────────────────────────

/// POST /api/v1/validation/properties/{parcel}/run
///
/// Validate a single property and return the full report, including the
/// property's outstanding issues after recording.
pub async fn run_property(
    State(state): State<AppState>,
    Path(parcel): Path<String>,
    body: Option<Json<RunOptions>>,
) -> AppResult<Json<DataResponse<PropertyReport>>> {
    let options = body.map(|Json(options)| options).unwrap_or_default();
    let report = state.runner.validate_parcel(&parcel, &options).await?;
    Ok(Json(DataResponse { data: report }))
}

/// Request body for validating an explicit parcel list.
#[derive(Debug, Deserialize)]
pub struct RunBatchRequest {
    pub parcel_numbers: Vec<String>,
    #[serde(flatten)]
    pub options: RunOptions,
}

/// POST /api/v1/validation/run
pub async fn run_batch(
    State(state): State<AppState>,
    Json(request): Json<RunBatchRequest>,
) -> AppResult<Json<DataResponse<BatchSummary>>> {
    let summary = state
        .runner
        .validate_parcels(&request.parcel_numbers, &request.options)
        .await?;
    Ok(Json(DataResponse { data: summary }))
}

/// Response payload for a submitted full-roll run.
#[derive(Debug, Serialize)]
pub struct RunAllResponse {
    pub job_id: Uuid,
    pub message: &'static str,
    pub status: &'static str,
}

/// POST /api/v1/validation/run-all
///
/// Start a full-roll validation job and return its id immediately. A
/// second submission while one run is active is a 409.
pub async fn run_all(
    State(state): State<AppState>,
    body: Option<Json<RunOptions>>,
) -> AppResult<Json<DataResponse<RunAllResponse>>> {
    let options = body.map(|Json(options)| options).unwrap_or_default();
    let job_id = state
        .jobs
        .start_validate_all(state.runner.clone(), options)?;
    Ok(Json(DataResponse {
        data: RunAllResponse {
            job_id,
            message: "Full validation run started",
            status: "running",
        },
    }))
}

/// GET /api/v1/validation/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DataResponse<JobSnapshot>>> {
    let snapshot = state.jobs.snapshot(id)?;
    Ok(Json(DataResponse { data: snapshot }))
}

/// POST /api/v1/validation/jobs/{id}/cancel
///
/// Request cancellation; idempotent. The in-flight page still commits
/// before the job reports cancelled.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DataResponse<JobSnapshot>>> {
    let snapshot = state.jobs.cancel(id)?;
    Ok(Json(DataResponse { data: snapshot }))
}
