//! Route definitions for the `/validation` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::validation;
use crate::state::AppState;

/// Routes mounted at `/validation`.
///
/// ```text
/// GET    /rules                     -> list_rules   (?category, ?entity_type, ?active_only)
/// POST   /rules                     -> create_rule
/// GET    /rules/{code}              -> get_rule
/// PATCH  /rules/{code}              -> update_rule  (code immutable; no DELETE, deactivate instead)
/// POST   /properties/{parcel}/run   -> run_property
/// POST   /run                       -> run_batch
/// POST   /run-all                   -> run_all      (background job)
/// GET    /jobs/{id}                 -> get_job
/// POST   /jobs/{id}/cancel          -> cancel_job
/// ```
pub fn validation_router() -> Router<AppState> {
    Router::new()
        .route(
            "/rules",
            get(validation::list_rules).post(validation::create_rule),
        )
        .route(
            "/rules/{code}",
            get(validation::get_rule).patch(validation::update_rule),
        )
        .route("/properties/{parcel}/run", post(validation::run_property))
        .route("/run", post(validation::run_batch))
        .route("/run-all", post(validation::run_all))
        .route("/jobs/{id}", get(validation::get_job))
        .route("/jobs/{id}/cancel", post(validation::cancel_job))
}
