use std::time::Duration;

use adslot_core::error::CoreError;

/// PostgreSQL SQLSTATEs raised when a transaction loses a race with a
/// concurrent writer: serialization_failure, deadlock_detected,
/// lock_not_available (lock_timeout).
const CONFLICT_SQLSTATES: [&str; 3] = ["40001", "40P01", "55P03"];

/// Error type returned by every engine operation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A domain-level failure (validation, eligibility, capacity, ...).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The transactional store failed or is unavailable.
    #[error("Storage error: {0}")]
    Storage(sqlx::Error),

    /// The transaction did not finish within its time budget. Nothing was
    /// committed.
    #[error("Operation timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Run a transaction future under a time budget.
///
/// On expiry the future is dropped, which rolls back any open sqlx
/// transaction it owns.
pub(crate) async fn within<T, F>(budget: Duration, fut: F) -> EngineResult<T>
where
    F: std::future::Future<Output = EngineResult<T>>,
{
    tokio::time::timeout(budget, fut)
        .await
        .map_err(|_| EngineError::Timeout(budget))?
}

impl EngineError {
    /// Whether the caller may retry the operation. Storage failures are
    /// retryable with backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Core(core) => core.is_retryable(),
            EngineError::Storage(_) => true,
            EngineError::Timeout(_) => true,
        }
    }

    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, EngineError::Core(CoreError::ConcurrencyConflict(_)))
    }
}

impl From<sqlx::Error> for EngineError {
    /// Lock timeouts, deadlocks, and serialization failures become
    /// [`CoreError::ConcurrencyConflict`]; everything else is a storage error.
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let code = db_err.code();
            if code
                .as_deref()
                .is_some_and(|c| CONFLICT_SQLSTATES.contains(&c))
            {
                return EngineError::Core(CoreError::ConcurrencyConflict(
                    db_err.message().to_string(),
                ));
            }
        }
        EngineError::Storage(err)
    }
}
