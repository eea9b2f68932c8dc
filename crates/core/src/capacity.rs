//! Slot capacity and pricing rules for featured placements.
//!
//! Capacity is resolved per `(category, placement)` from the key/value
//! settings store. Keys follow `featured_slots_<placement>` for the global
//! limit and `featured_slots_<placement>_category_<id>` for a per-category
//! override. Anything missing or malformed falls back to the compiled-in
//! defaults below.

use crate::error::CoreError;
use crate::featured::Placement;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_HOMEPAGE_SLOTS: i32 = 10;
pub const DEFAULT_RESULTS_SLOTS: i32 = 4;
pub const DEFAULT_DETAIL_SLOTS: i32 = 6;

pub const DEFAULT_HOMEPAGE_PRICE_PER_DAY: i32 = 3;
pub const DEFAULT_RESULTS_PRICE_PER_DAY: i32 = 2;
pub const DEFAULT_DETAIL_PRICE_PER_DAY: i32 = 1;

/// Namespace mixed into advisory lock keys so they cannot collide with
/// locks taken by other subsystems sharing the database.
const SLOT_LOCK_NAMESPACE: i64 = 0x4144_534C_0000_0000;

/// Compiled-in slot limit for a placement.
pub fn default_max_slots(placement: Placement) -> i32 {
    match placement {
        Placement::Homepage => DEFAULT_HOMEPAGE_SLOTS,
        Placement::Results => DEFAULT_RESULTS_SLOTS,
        Placement::Detail => DEFAULT_DETAIL_SLOTS,
    }
}

/// Compiled-in credit price per day for a placement.
pub fn default_price_per_day(placement: Placement) -> i32 {
    match placement {
        Placement::Homepage => DEFAULT_HOMEPAGE_PRICE_PER_DAY,
        Placement::Results => DEFAULT_RESULTS_PRICE_PER_DAY,
        Placement::Detail => DEFAULT_DETAIL_PRICE_PER_DAY,
    }
}

// ---------------------------------------------------------------------------
// Setting keys
// ---------------------------------------------------------------------------

/// Global slot limit key, e.g. `featured_slots_homepage`.
pub fn slots_setting_key(placement: Placement) -> String {
    format!("featured_slots_{placement}")
}

/// Per-category override key, e.g. `featured_slots_results_category_42`.
pub fn category_slots_setting_key(placement: Placement, category_id: DbId) -> String {
    format!("featured_slots_{placement}_category_{category_id}")
}

/// Per-day price key, e.g. `featured_price_detail`.
pub fn price_setting_key(placement: Placement) -> String {
    format!("featured_price_{placement}")
}

/// Whether `key` is one of the settings this engine reads.
pub fn is_featured_setting_key(key: &str) -> bool {
    Placement::ALL.iter().any(|p| {
        key == slots_setting_key(*p)
            || key == price_setting_key(*p)
            || key
                .strip_prefix(&format!("featured_slots_{p}_category_"))
                .is_some_and(|id| id.parse::<DbId>().is_ok_and(|id| id > 0))
    })
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a stored setting value into a positive integer.
///
/// Returns `None` for non-numeric, zero, or negative values so the caller
/// falls back to the next layer.
pub fn parse_positive(raw: &str) -> Option<i32> {
    raw.trim().parse::<i32>().ok().filter(|v| *v > 0)
}

/// Pick the effective slot limit from the override, global, and default
/// layers, in that order.
pub fn resolve_layers(
    placement: Placement,
    category_override: Option<&str>,
    global: Option<&str>,
) -> i32 {
    category_override
        .and_then(parse_positive)
        .or_else(|| global.and_then(parse_positive))
        .unwrap_or_else(|| default_max_slots(placement))
}

// ---------------------------------------------------------------------------
// Pricing
// ---------------------------------------------------------------------------

/// Total credits for featuring an ad for `duration_days`.
pub fn credit_cost(price_per_day: i32, duration_days: i32) -> Result<i32, CoreError> {
    price_per_day.checked_mul(duration_days).ok_or_else(|| {
        CoreError::Validation(format!(
            "Credit cost overflows for {duration_days} days at {price_per_day}/day"
        ))
    })
}

// ---------------------------------------------------------------------------
// Locking
// ---------------------------------------------------------------------------

/// Advisory lock key serializing admissions for one `(category, placement)`.
///
/// Distinct pairs map to distinct keys for any non-negative category id
/// below 2^61.
pub fn slot_lock_key(category_id: DbId, placement: Placement) -> i64 {
    SLOT_LOCK_NAMESPACE ^ category_id.wrapping_mul(3).wrapping_add(placement.ordinal())
}
