pub mod featured;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /featured                                 self-service admit (POST, auth), list (GET, admin)
/// /featured/availability                    slot snapshot (GET, auth)
/// /featured/display                         active slots for a surface (GET, public)
/// /featured/sweep                           activate / expire due rows (POST, scheduler)
/// /featured/{id}                            get one (GET, owner or admin)
/// /featured/{id}/audit                      audit trail (GET, admin)
///
/// /admin/featured                           manual admit (POST, admin)
/// /admin/featured/capacity                  resolved limits (GET), write limit (PUT)
/// /admin/featured/{id}/cancel               cancel (POST, admin)
/// /admin/featured/{id}/restore              restore from history (POST, admin)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/featured", featured::router())
        .nest("/admin/featured", featured::admin_router())
}
