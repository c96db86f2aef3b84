//! Route definitions for the `/properties` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::{issues, properties};
use crate::state::AppState;

/// Routes mounted at `/properties`.
///
/// ```text
/// GET /                  -> list_properties (?validation_status, ?limit, ?offset)
/// GET /{parcel}          -> get_property
/// GET /{parcel}/issues   -> property issues (?status)
/// ```
pub fn properties_router() -> Router<AppState> {
    Router::new()
        .route("/", get(properties::list_properties))
        .route("/{parcel}", get(properties::get_property))
        .route("/{parcel}/issues", get(issues::list_property_issues))
}
