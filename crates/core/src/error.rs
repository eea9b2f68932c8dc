use crate::featured::Placement;
use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Ad {ad_id} is not eligible for featuring: {reason}")]
    AdNotEligible { ad_id: DbId, reason: String },

    #[error("Ad {ad_id} already holds a {placement} slot")]
    AlreadyFeatured { ad_id: DbId, placement: Placement },

    #[error("No slots available ({occupied}/{max})")]
    CapacityExceeded { occupied: i64, max: i32 },

    #[error("Concurrent update conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("Payment required: {0}")]
    PaymentRequired(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether the failed operation may be retried automatically.
    ///
    /// Only concurrency conflicts qualify: the aborted transaction committed
    /// nothing, and capacity or eligibility failures are business facts.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::ConcurrencyConflict(_))
    }
}
