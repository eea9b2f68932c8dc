//! Sweep trigger for external schedulers.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;

use crate::error::AppResult;
use crate::middleware::scheduler::RequireScheduler;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/featured/sweep
///
/// Activate due pending placements and expire due active ones. Safe to call
/// concurrently with other sweeps.
pub async fn run_sweep(
    _scheduler: RequireScheduler,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let report = state.engine.sweeper.sweep(Utc::now()).await?;

    tracing::debug!(
        activated = report.activated,
        expired = report.expired,
        "Sweep trigger served",
    );

    Ok(Json(DataResponse { data: report }))
}
