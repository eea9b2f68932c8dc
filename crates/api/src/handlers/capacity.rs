//! Admin handlers for slot capacity settings.

use adslot_core::capacity::{
    category_slots_setting_key, is_featured_setting_key, slots_setting_key,
};
use adslot_core::error::CoreError;
use adslot_core::featured::Placement;
use adslot_core::types::DbId;
use adslot_db::models::platform_setting::PlatformSetting;
use adslot_db::repositories::PlatformSettingRepo;
use adslot_engine::SlotUsage;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::middleware::rbac::RequireAdmin;
use crate::query::CategoryParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// Upper bound accepted for a configured slot limit.
pub const MAX_SLOT_LIMIT: i32 = 1000;

/// Prefix shared by every featured capacity and price setting.
const SETTINGS_PREFIX: &str = "featured_";

/// Resolved limits for one category plus the raw settings behind them.
#[derive(Debug, Serialize)]
pub struct CapacityOverview {
    pub category_id: DbId,
    pub pools: Vec<SlotUsage>,
    pub settings: Vec<PlatformSetting>,
}

/// Body of `PUT /admin/featured/capacity`.
///
/// Without `category_id` the global limit for `placement` is written.
#[derive(Debug, Deserialize)]
pub struct UpdateCapacity {
    pub placement: String,
    pub category_id: Option<DbId>,
    pub max_slots: i32,
}

/// GET /api/v1/admin/featured/capacity?category_id=
pub async fn get_capacity(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(params): Query<CategoryParams>,
) -> AppResult<impl IntoResponse> {
    let mut pools = Vec::with_capacity(Placement::ALL.len());
    for placement in Placement::ALL {
        pools.push(
            state
                .engine
                .admission
                .availability(params.category_id, placement)
                .await?,
        );
    }
    let settings: Vec<PlatformSetting> =
        PlatformSettingRepo::list_with_prefix(&state.pool, SETTINGS_PREFIX)
            .await?
            .into_iter()
            .filter(|s| is_featured_setting_key(&s.key))
            .collect();

    Ok(Json(DataResponse {
        data: CapacityOverview {
            category_id: params.category_id,
            pools,
            settings,
        },
    }))
}

/// PUT /api/v1/admin/featured/capacity
///
/// Write a global or per-category slot limit and drop cached limits.
/// Lowering a limit below current occupancy is allowed; admissions stop
/// until occupancy falls below it.
pub async fn update_capacity(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<UpdateCapacity>,
) -> AppResult<impl IntoResponse> {
    let placement: Placement = input.placement.parse()?;
    validate_max_slots(input.max_slots)?;

    let key = match input.category_id {
        Some(category_id) if category_id <= 0 => {
            return Err(CoreError::Validation("category_id must be positive".into()).into());
        }
        Some(category_id) => category_slots_setting_key(placement, category_id),
        None => slots_setting_key(placement),
    };

    let setting = PlatformSettingRepo::upsert(
        &state.pool,
        &key,
        &input.max_slots.to_string(),
        Some(admin.user_id),
    )
    .await?;
    state.engine.capacity.invalidate();

    tracing::info!(
        key = %key,
        max_slots = input.max_slots,
        user_id = admin.user_id,
        "Featured capacity updated",
    );

    Ok(Json(DataResponse { data: setting }))
}

fn validate_max_slots(max_slots: i32) -> Result<(), CoreError> {
    if (1..=MAX_SLOT_LIMIT).contains(&max_slots) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "max_slots must be between 1 and {MAX_SLOT_LIMIT}, got {max_slots}"
        )))
    }
}
