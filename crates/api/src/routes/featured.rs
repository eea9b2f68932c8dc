//! Route definitions for featured placements.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{capacity, featured, sweep};
use crate::state::AppState;

/// Routes mounted at `/featured`.
///
/// ```text
/// POST /                -> create_self_service
/// GET  /                -> list
/// GET  /availability    -> availability
/// GET  /display         -> display
/// POST /sweep           -> run_sweep
/// GET  /{id}            -> get_by_id
/// GET  /{id}/audit      -> audit_trail
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(featured::list).post(featured::create_self_service),
        )
        .route("/availability", get(featured::availability))
        .route("/display", get(featured::display))
        .route("/sweep", post(sweep::run_sweep))
        .route("/{id}", get(featured::get_by_id))
        .route("/{id}/audit", get(featured::audit_trail))
}

/// Routes mounted at `/admin/featured`.
///
/// ```text
/// POST /                -> create_manual
/// GET  /capacity        -> get_capacity
/// PUT  /capacity        -> update_capacity
/// POST /{id}/cancel     -> cancel
/// POST /{id}/restore    -> restore
/// ```
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", post(featured::create_manual))
        .route(
            "/capacity",
            get(capacity::get_capacity).put(capacity::update_capacity),
        )
        .route("/{id}/cancel", post(featured::cancel))
        .route("/{id}/restore", post(featured::restore))
}
