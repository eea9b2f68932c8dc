//! Handlers for featured placements: admission, listing, cancellation and
//! restoration.
//!
//! Self-service admission is the only path that touches credits. It runs a
//! preflight, debits, then admits; the engine never debits on its own.

use adslot_core::error::CoreError;
use adslot_core::featured::{validate_duration, Funding, Placement};
use adslot_core::types::{DbId, Timestamp};
use adslot_db::models::featured_placement::{FeaturedPlacement, FeaturedPlacementQuery};
use adslot_db::repositories::{FeaturedAuditRepo, FeaturedPlacementRepo};
use adslot_engine::{AdSummary, AdmissionRequest};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::{RequireAdmin, RequireAuth};
use crate::query::SlotPoolParams;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Body of `POST /featured`.
#[derive(Debug, Deserialize)]
pub struct SelfServiceFeatureRequest {
    pub ad_id: DbId,
    /// Derived from the ad when omitted.
    pub category_id: Option<DbId>,
    pub placement: String,
    /// Defaults to today (UTC).
    pub scheduled_start: Option<NaiveDate>,
    pub duration_days: i32,
}

/// Body of `POST /admin/featured`.
#[derive(Debug, Deserialize)]
pub struct ManualFeatureRequest {
    pub ad_id: DbId,
    pub category_id: Option<DbId>,
    pub placement: String,
    pub scheduled_start: Option<NaiveDate>,
    pub duration_days: i32,
    #[serde(default)]
    pub priority: i32,
    pub notes: Option<String>,
}

/// Body of `POST /admin/featured/{id}/cancel`.
#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Public projection of an active slot.
#[derive(Debug, Serialize)]
pub struct DisplaySlot {
    pub placement_id: DbId,
    pub ad_id: DbId,
    pub priority: i32,
    pub actual_start: Option<Timestamp>,
    pub expires_at: Timestamp,
}

impl From<FeaturedPlacement> for DisplaySlot {
    fn from(row: FeaturedPlacement) -> Self {
        Self {
            placement_id: row.id,
            ad_id: row.ad_id,
            priority: row.priority,
            actual_start: row.actual_start,
            expires_at: row.expires_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Admission
// ---------------------------------------------------------------------------

/// POST /api/v1/featured
///
/// Feature one of the caller's own ads, paying with credits.
pub async fn create_self_service(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(input): Json<SelfServiceFeatureRequest>,
) -> AppResult<impl IntoResponse> {
    let placement: Placement = input.placement.parse()?;
    validate_duration(input.duration_days)?;

    let (ad, category_id) = resolve_ad(&state, input.ad_id, input.category_id).await?;
    if ad.user_id != user.user_id {
        return Err(AppError::Core(CoreError::Forbidden(
            "Only the ad owner can feature this ad".into(),
        )));
    }

    let cost = state.engine.quote(placement, input.duration_days).await?;
    let request = AdmissionRequest {
        ad_id: ad.id,
        category_id,
        placement,
        scheduled_start: input.scheduled_start.unwrap_or_else(today),
        duration_days: input.duration_days,
        funding: Funding::SelfService {
            credits_spent: cost,
        },
        requested_by: user.actor(),
        priority: 0,
        notes: None,
    };

    let admission = state.engine.purchase(&request, Utc::now()).await?;

    tracing::info!(
        placement_id = admission.placement.id,
        ad_id = ad.id,
        user_id = user.user_id,
        placement = %placement,
        credits = cost,
        status = %admission.placement.status,
        "Self-service featured placement created",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: admission })))
}

/// POST /api/v1/admin/featured
///
/// Grant a featured slot without charging credits.
pub async fn create_manual(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<ManualFeatureRequest>,
) -> AppResult<impl IntoResponse> {
    let placement: Placement = input.placement.parse()?;
    let (ad, category_id) = resolve_ad(&state, input.ad_id, input.category_id).await?;

    let request = AdmissionRequest {
        ad_id: ad.id,
        category_id,
        placement,
        scheduled_start: input.scheduled_start.unwrap_or_else(today),
        duration_days: input.duration_days,
        funding: Funding::Manual {
            granted_by: admin.user_id,
        },
        requested_by: admin.actor(),
        priority: input.priority,
        notes: input.notes,
    };

    let admission = state.engine.admission.admit(&request, Utc::now()).await?;

    tracing::info!(
        placement_id = admission.placement.id,
        ad_id = ad.id,
        user_id = admin.user_id,
        placement = %placement,
        status = %admission.placement.status,
        "Manual featured placement created",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: admission })))
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// GET /api/v1/featured
///
/// List placements with optional `status`, `placement`, `category_id`,
/// `ad_id`, `limit` and `offset` filters.
pub async fn list(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(params): Query<FeaturedPlacementQuery>,
) -> AppResult<impl IntoResponse> {
    let rows = FeaturedPlacementRepo::list(&state.pool, &params).await?;
    Ok(Json(DataResponse { data: rows }))
}

/// GET /api/v1/featured/availability?category_id=&placement=
pub async fn availability(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Query(params): Query<SlotPoolParams>,
) -> AppResult<impl IntoResponse> {
    let placement = params.placement()?;
    let usage = state
        .engine
        .admission
        .availability(params.category_id, placement)
        .await?;
    Ok(Json(DataResponse { data: usage }))
}

/// GET /api/v1/featured/display?category_id=&placement=
///
/// Public. Active slots in display order (priority, then activation time).
pub async fn display(
    State(state): State<AppState>,
    Query(params): Query<SlotPoolParams>,
) -> AppResult<impl IntoResponse> {
    let placement = params.placement()?;
    let rows =
        FeaturedPlacementRepo::list_active_for_display(&state.pool, params.category_id, placement)
            .await?;
    let slots: Vec<DisplaySlot> = rows.into_iter().map(DisplaySlot::from).collect();
    Ok(Json(DataResponse { data: slots }))
}

/// GET /api/v1/featured/{id}
///
/// Visible to the requester, the ad owner and admins.
pub async fn get_by_id(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let row = find_placement(&state, id).await?;
    ensure_can_view(&state, &user, &row).await?;
    Ok(Json(DataResponse { data: row }))
}

/// GET /api/v1/featured/{id}/audit
pub async fn audit_trail(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    find_placement(&state, id).await?;
    let entries = FeaturedAuditRepo::list_for_placement(&state.pool, id).await?;
    Ok(Json(DataResponse { data: entries }))
}

// ---------------------------------------------------------------------------
// Cancellation / restoration
// ---------------------------------------------------------------------------

/// POST /api/v1/admin/featured/{id}/cancel
///
/// Cancel a pending or active placement. Credits are never refunded.
pub async fn cancel(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<CancelRequest>,
) -> AppResult<impl IntoResponse> {
    let row = state
        .engine
        .cancellation
        .cancel(id, &admin.actor(), input.reason.as_deref(), Utc::now())
        .await?;
    Ok(Json(DataResponse { data: row }))
}

/// POST /api/v1/admin/featured/{id}/restore
///
/// Re-admit a historical placement as a new manual placement starting today.
pub async fn restore(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let admission = state
        .engine
        .cancellation
        .restore_from_history(id, &admin.actor(), Utc::now())
        .await?;

    tracing::info!(
        placement_id = admission.placement.id,
        restored_from = id,
        user_id = admin.user_id,
        "Featured placement restored",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: admission })))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Look up the ad and settle the category: derived when omitted, rejected
/// when it disagrees with the catalog.
async fn resolve_ad(
    state: &AppState,
    ad_id: DbId,
    category_id: Option<DbId>,
) -> AppResult<(AdSummary, DbId)> {
    let ad = state
        .engine
        .catalog
        .get_ad(ad_id)
        .await?
        .ok_or_else(|| CoreError::AdNotEligible {
            ad_id,
            reason: "ad does not exist".into(),
        })?;

    match category_id {
        Some(supplied) if supplied != ad.category_id => Err(AppError::Core(
            CoreError::Validation(format!(
                "category_id {supplied} does not match the ad's category {}",
                ad.category_id
            )),
        )),
        _ => {
            let category_id = ad.category_id;
            Ok((ad, category_id))
        }
    }
}

async fn find_placement(state: &AppState, id: DbId) -> AppResult<FeaturedPlacement> {
    FeaturedPlacementRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "FeaturedPlacement",
            id,
        }))
}

/// `user_id` on a row is the acting user, so a manual grant records the
/// admin; the ad owner is resolved through the catalog.
async fn ensure_can_view(
    state: &AppState,
    user: &AuthUser,
    row: &FeaturedPlacement,
) -> AppResult<()> {
    if user.is_admin() || row.user_id == user.user_id {
        return Ok(());
    }
    let owns_ad = state
        .engine
        .catalog
        .get_ad(row.ad_id)
        .await?
        .is_some_and(|ad| ad.user_id == user.user_id);
    if owns_ad {
        Ok(())
    } else {
        Err(AppError::Core(CoreError::Forbidden(
            "Not allowed to view this placement".into(),
        )))
    }
}
