//! Handlers for the `/properties` resource: the denormalized validation
//! status surface.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use taxroll_core::error::CoreError;
use taxroll_core::property::{PropertyRecord, ValidationStatus};
use taxroll_engine::store::PropertyFilter;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Query parameters for the property listing.
#[derive(Debug, Deserialize)]
pub struct ListPropertiesParams {
    pub validation_status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/v1/properties?validation_status=invalid&limit=100&offset=0
pub async fn list_properties(
    State(state): State<AppState>,
    Query(params): Query<ListPropertiesParams>,
) -> AppResult<Json<DataResponse<Vec<PropertyRecord>>>> {
    let validation_status = params
        .validation_status
        .as_deref()
        .map(ValidationStatus::from_str)
        .transpose()?;
    let filter = PropertyFilter {
        validation_status,
        limit: params.limit,
        offset: params.offset,
    };
    let properties = state.store.list_properties(&filter).await?;
    Ok(Json(DataResponse { data: properties }))
}

/// GET /api/v1/properties/{parcel}
pub async fn get_property(
    State(state): State<AppState>,
    Path(parcel): Path<String>,
) -> AppResult<Json<DataResponse<PropertyRecord>>> {
    let property = state
        .store
        .property_by_parcel(&parcel)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Property",
            key: parcel,
        }))?;
    Ok(Json(DataResponse { data: property }))
}
