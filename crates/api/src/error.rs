use std::time::Duration;

use adslot_core::error::CoreError;
use adslot_engine::EngineError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// SQLSTATEs raised when a transaction loses a serialization race.
const CONFLICT_SQLSTATES: [&str; 3] = ["40001", "40P01", "55P03"];

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `adslot_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An engine operation exceeded its transaction budget.
    #[error("Operation timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Core(core) => AppError::Core(core),
            EngineError::Storage(db) => AppError::Database(db),
            EngineError::Timeout(budget) => AppError::Timeout(budget),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::AdNotEligible { .. } => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "AD_NOT_ELIGIBLE",
                    core.to_string(),
                ),
                CoreError::AlreadyFeatured { .. } => {
                    (StatusCode::CONFLICT, "ALREADY_FEATURED", core.to_string())
                }
                CoreError::CapacityExceeded { occupied, max } => {
                    let body = json!({
                        "error": core.to_string(),
                        "code": "CAPACITY_EXCEEDED",
                        "occupied": occupied,
                        "max": max,
                    });
                    return (StatusCode::CONFLICT, axum::Json(body)).into_response();
                }
                CoreError::ConcurrencyConflict(msg) => {
                    (StatusCode::CONFLICT, "CONCURRENCY_CONFLICT", msg.clone())
                }
                CoreError::PaymentRequired(msg) => {
                    (StatusCode::PAYMENT_REQUIRED, "PAYMENT_REQUIRED", msg.clone())
                }
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            // --- Database errors ---
            AppError::Database(err) => classify_sqlx_error(err),

            // --- HTTP-specific errors ---
            AppError::Timeout(budget) => {
                tracing::warn!(budget_ms = budget.as_millis() as u64, "Engine operation timed out");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "TIMEOUT",
                    "The operation timed out, please retry".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (constraint name starting with `uq_`) map to 409.
/// - Serialization failures, deadlocks and lock timeouts map to 409
///   `CONCURRENCY_CONFLICT`.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            let code = db_err.code();
            // PostgreSQL unique constraint violation: error code 23505
            if code.as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                    );
                }
            }
            if code
                .as_deref()
                .is_some_and(|c| CONFLICT_SQLSTATES.contains(&c))
            {
                return (
                    StatusCode::CONFLICT,
                    "CONCURRENCY_CONFLICT",
                    "Concurrent update conflict, please retry".to_string(),
                );
            }
            tracing::error!(error = %db_err, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
        other => {
            tracing::error!(error = %other, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}
