//! Handlers for validation issues: listing and lifecycle transitions.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use taxroll_core::types::DbId;
use taxroll_core::validation::issue::{IssueFilter, IssueStatus, IssueTransition, ValidationIssue};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Query parameters for issue listings.
#[derive(Debug, Deserialize)]
pub struct ListIssuesParams {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/v1/issues?status=open&limit=100&offset=0
pub async fn list_issues(
    State(state): State<AppState>,
    Query(params): Query<ListIssuesParams>,
) -> AppResult<Json<DataResponse<Vec<ValidationIssue>>>> {
    let status = params
        .status
        .as_deref()
        .map(IssueStatus::from_str)
        .transpose()?;
    let filter = IssueFilter {
        status,
        limit: params.limit,
        offset: params.offset,
    };
    let issues = state.issues.list_issues(&filter).await?;
    Ok(Json(DataResponse { data: issues }))
}

/// GET /api/v1/properties/{parcel}/issues?status=open
pub async fn list_property_issues(
    State(state): State<AppState>,
    Path(parcel): Path<String>,
    Query(params): Query<ListIssuesParams>,
) -> AppResult<Json<DataResponse<Vec<ValidationIssue>>>> {
    let status = params
        .status
        .as_deref()
        .map(IssueStatus::from_str)
        .transpose()?;
    let mut issues = state.issues.issues_for_parcel(&parcel).await?;
    if let Some(status) = status {
        issues.retain(|issue| issue.status == status);
    }
    Ok(Json(DataResponse { data: issues }))
}

/// POST /api/v1/issues/{id}/status
///
/// Apply a lifecycle transition. Illegal transitions (including anything
/// out of a terminal state) are a 409.
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(transition): Json<IssueTransition>,
) -> AppResult<Json<DataResponse<ValidationIssue>>> {
    let issue = state.issues.update_status(id, &transition).await?;
    Ok(Json(DataResponse { data: issue }))
}
