//! Featured audit trail models.
//!
//! Entries are immutable once written (no `updated_at`); the table rejects
//! UPDATE and DELETE at the database level.

use adslot_core::featured::AuditAction;
use adslot_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `featured_audit_log` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FeaturedAuditEntry {
    pub id: DbId,
    pub placement_id: DbId,
    pub ad_id: DbId,
    pub actor_id: Option<DbId>,
    pub actor_label: String,
    #[sqlx(try_from = "String")]
    pub action: AuditAction,
    pub reason: Option<String>,
    pub metadata: serde_json::Value,
    pub occurred_at: Timestamp,
    pub created_at: Timestamp,
}

/// DTO for appending an audit entry.
#[derive(Debug, Clone)]
pub struct CreateFeaturedAuditEntry {
    pub placement_id: DbId,
    pub ad_id: DbId,
    /// `None` for system-driven transitions.
    pub actor_id: Option<DbId>,
    pub actor_label: String,
    pub action: AuditAction,
    pub reason: Option<String>,
    pub metadata: serde_json::Value,
    pub occurred_at: Timestamp,
}
