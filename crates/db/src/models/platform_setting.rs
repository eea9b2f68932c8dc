//! Key/value platform settings.

use adslot_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `platform_settings` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PlatformSetting {
    pub key: String,
    pub value: String,
    pub updated_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
