pub mod health;
pub mod issues;
pub mod properties;
pub mod validation;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /validation/rules                     list, create
/// /validation/rules/{code}              get, patch (code immutable; no DELETE)
/// /validation/properties/{parcel}/run   validate one property
/// /validation/run                       validate an explicit parcel list
/// /validation/run-all                   start a full-roll background job
/// /validation/jobs/{id}                 job snapshot
/// /validation/jobs/{id}/cancel          request job cancellation
///
/// /issues                               list across properties
/// /issues/{id}/status                   lifecycle transition
///
/// /properties                           list with denormalized status
/// /properties/{parcel}                  get one property
/// /properties/{parcel}/issues           issues recorded against a parcel
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/validation", validation::validation_router())
        .nest("/issues", issues::issues_router())
        .nest("/properties", properties::properties_router())
}
