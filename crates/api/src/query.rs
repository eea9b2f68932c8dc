//! Shared query parameter types for API handlers.

use adslot_core::featured::Placement;
use adslot_core::types::DbId;
use serde::Deserialize;

use crate::error::AppResult;

/// Slot pool selector (`?category_id=&placement=`).
///
/// `placement` is parsed by hand so an unknown surface yields the usual
/// `VALIDATION_ERROR` body instead of a bare extractor rejection.
#[derive(Debug, Deserialize)]
pub struct SlotPoolParams {
    pub category_id: DbId,
    pub placement: String,
}

impl SlotPoolParams {
    pub fn placement(&self) -> AppResult<Placement> {
        Ok(self.placement.parse()?)
    }
}

/// Category scope (`?category_id=`).
#[derive(Debug, Deserialize)]
pub struct CategoryParams {
    pub category_id: DbId,
}
