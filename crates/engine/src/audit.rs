//! Audit trail writes.
//!
//! Entries are written inside the transaction that performs the transition,
//! under a savepoint. A failed audit write is logged and rolled back to the
//! savepoint; the transition itself still commits.

use adslot_core::featured::FeaturedStatus;
use adslot_core::types::DbId;
use adslot_db::models::featured_audit::CreateFeaturedAuditEntry;
use adslot_db::repositories::FeaturedAuditRepo;
use serde_json::json;
use sqlx::{Connection, PgConnection};

/// A human caller that initiates admissions, cancellations, or restorations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: DbId,
    /// Recorded as `actor_label` on audit entries.
    pub label: String,
}

impl Actor {
    /// Label with the user's email when known, else `user:<id>`.
    pub fn new(user_id: DbId, email: Option<&str>) -> Self {
        let label = match email {
            Some(email) if !email.trim().is_empty() => email.trim().to_string(),
            _ => format!("user:{user_id}"),
        };
        Self { user_id, label }
    }
}

/// Append `entries` under a savepoint. Returns whether they were written.
pub(crate) async fn append_best_effort(
    conn: &mut PgConnection,
    entries: &[CreateFeaturedAuditEntry],
) -> bool {
    if entries.is_empty() {
        return true;
    }

    let mut savepoint = match conn.begin().await {
        Ok(sp) => sp,
        Err(e) => {
            tracing::error!(error = %e, count = entries.len(), "Audit savepoint failed");
            return false;
        }
    };

    match FeaturedAuditRepo::batch_insert(&mut *savepoint, entries).await {
        Ok(_) => match savepoint.commit().await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, count = entries.len(), "Audit release failed");
                false
            }
        },
        Err(e) => {
            tracing::error!(
                error = %e,
                count = entries.len(),
                placement_id = entries[0].placement_id,
                action = %entries[0].action,
                "Audit write failed, transition kept",
            );
            if let Err(rb) = savepoint.rollback().await {
                tracing::error!(error = %rb, "Audit savepoint rollback failed");
            }
            false
        }
    }
}

/// Metadata snapshot for a status transition.
pub(crate) fn transition_metadata(
    prior: Option<FeaturedStatus>,
    new: FeaturedStatus,
) -> serde_json::Value {
    json!({
        "prior_status": prior.map(FeaturedStatus::as_str),
        "new_status": new.as_str(),
    })
}
