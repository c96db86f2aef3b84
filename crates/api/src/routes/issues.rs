//! Route definitions for the `/issues` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::issues;
use crate::state::AppState;

/// Routes mounted at `/issues`.
///
/// ```text
/// GET    /              -> list_issues   (?status, ?limit, ?offset)
/// POST   /{id}/status   -> update_status (lifecycle transition)
/// ```
pub fn issues_router() -> Router<AppState> {
    Router::new()
        .route("/", get(issues::list_issues))
        .route("/{id}/status", post(issues::update_status))
}
