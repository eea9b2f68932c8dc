//! Ad catalog projection consumed by the admission path.

use adslot_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `ads` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Ad {
    pub id: DbId,
    pub user_id: DbId,
    pub category_id: DbId,
    pub title: String,
    pub status: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for inserting an ad (used when seeding the catalog).
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAd {
    pub user_id: DbId,
    pub category_id: DbId,
    pub title: String,
    pub status: Option<String>,
}
