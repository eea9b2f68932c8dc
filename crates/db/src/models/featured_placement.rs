//! Featured placement (slot ledger) entity model and DTOs.

use adslot_core::featured::{FeaturedStatus, Placement};
use adslot_core::types::{DbId, Timestamp};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `featured_placements` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FeaturedPlacement {
    pub id: DbId,
    pub ad_id: DbId,
    pub user_id: DbId,
    pub category_id: DbId,
    #[sqlx(try_from = "String")]
    pub placement: Placement,
    #[sqlx(try_from = "String")]
    pub status: FeaturedStatus,
    pub scheduled_start: NaiveDate,
    pub actual_start: Option<Timestamp>,
    pub duration_days: i32,
    pub expires_at: Timestamp,
    pub credit_consumed: bool,
    pub credits_spent: i32,
    pub is_manual: bool,
    pub manual_activated_by: Option<DbId>,
    pub priority: i32,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<DbId>,
    pub cancelled_at: Option<Timestamp>,
    pub refunded: bool,
    pub restored_from_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Insert DTO built by the admission controller.
///
/// Not deserializable: every field is derived server-side from a validated
/// admission request.
#[derive(Debug, Clone)]
pub struct NewFeaturedPlacement {
    pub ad_id: DbId,
    pub user_id: DbId,
    pub category_id: DbId,
    pub placement: Placement,
    pub status: FeaturedStatus,
    pub scheduled_start: NaiveDate,
    pub actual_start: Option<Timestamp>,
    pub duration_days: i32,
    pub expires_at: Timestamp,
    pub credit_consumed: bool,
    pub credits_spent: i32,
    pub is_manual: bool,
    pub manual_activated_by: Option<DbId>,
    pub priority: i32,
    pub notes: Option<String>,
    pub restored_from_id: Option<DbId>,
}

/// Filter parameters for listing placements.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeaturedPlacementQuery {
    pub status: Option<FeaturedStatus>,
    pub placement: Option<Placement>,
    pub category_id: Option<DbId>,
    pub ad_id: Option<DbId>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
