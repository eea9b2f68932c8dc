//! Scheduler capability extractor for the sweep trigger.
//!
//! The sweep is invoked by an external cron, not by a user, so it carries a
//! shared token in [`SCHEDULER_TOKEN_HEADER`] instead of a JWT.

use adslot_core::error::CoreError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::state::AppState;

/// Header carrying the scheduler token.
pub const SCHEDULER_TOKEN_HEADER: &str = "x-scheduler-token";

/// Proof that the caller holds the scheduler capability.
///
/// Rejects with 401 when the header is missing and 403 when it does not
/// match. When the startup bypass flag is set every caller is accepted.
pub struct RequireScheduler;

impl FromRequestParts<AppState> for RequireScheduler {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let scheduler = &state.config.scheduler;
        if scheduler.bypass {
            tracing::debug!("Scheduler auth bypassed");
            return Ok(RequireScheduler);
        }

        let presented = parts
            .headers
            .get(SCHEDULER_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "Missing X-Scheduler-Token header".into(),
                ))
            })?;

        if !scheduler.verify(presented) {
            tracing::warn!("Rejected sweep trigger with invalid scheduler token");
            return Err(AppError::Core(CoreError::Forbidden(
                "Invalid scheduler token".into(),
            )));
        }
        Ok(RequireScheduler)
    }
}
