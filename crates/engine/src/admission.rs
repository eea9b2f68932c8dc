//! Admission controller: decides whether a request may take a slot.
//!
//! Each admission runs in one transaction that takes the advisory lock for
//! its `(category, placement)` pool, re-checks duplicates and capacity, then
//! inserts the ledger row and its audit entry. Admissions on the same pool
//! serialize; different pools proceed in parallel.

use std::sync::Arc;
use std::time::Duration;

use adslot_core::error::CoreError;
use adslot_core::featured::{
    compute_expires_at, initial_status, slots_remaining, validate_duration, validate_free_text,
    validate_scheduled_start, AuditAction, FeaturedStatus, Funding, Placement,
};
use adslot_core::types::{DbId, Timestamp};
use adslot_db::models::featured_audit::CreateFeaturedAuditEntry;
use adslot_db::models::featured_placement::{FeaturedPlacement, NewFeaturedPlacement};
use adslot_db::repositories::FeaturedPlacementRepo;
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;

use crate::audit::{self, Actor};
use crate::capacity::CapacityResolver;
use crate::catalog::{AdCatalog, AdSummary};
use crate::error::{within, EngineError, EngineResult};

/// Partial unique index guarding one live row per `(ad, placement)`.
const LIVE_AD_INDEX: &str = "uq_featured_placements_live_ad";

/// A validated-on-entry request for a featured slot.
#[derive(Debug, Clone)]
pub struct AdmissionRequest {
    pub ad_id: DbId,
    pub category_id: DbId,
    pub placement: Placement,
    pub scheduled_start: NaiveDate,
    pub duration_days: i32,
    pub funding: Funding,
    pub requested_by: Actor,
    /// Display tie-break only.
    pub priority: i32,
    pub notes: Option<String>,
}

/// A successful admission: the new ledger row plus the capacity snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct Admission {
    #[serde(flatten)]
    pub placement: FeaturedPlacement,
    /// Occupied slots including this admission.
    pub slots_used: i64,
    pub max_slots: i32,
    pub slots_remaining: i64,
}

/// Point-in-time occupancy of a slot pool. Advisory only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotUsage {
    pub category_id: DbId,
    pub placement: Placement,
    pub occupied: i64,
    pub max_slots: i32,
    pub remaining: i64,
}

impl SlotUsage {
    pub fn new(category_id: DbId, placement: Placement, occupied: i64, max_slots: i32) -> Self {
        Self {
            category_id,
            placement,
            occupied,
            max_slots,
            remaining: (i64::from(max_slots) - occupied).max(0),
        }
    }

    pub fn is_full(&self) -> bool {
        self.occupied >= i64::from(self.max_slots)
    }
}

/// Result of the non-locking checks run before a self-service debit.
#[derive(Debug, Clone)]
pub struct Preflight {
    pub ad: AdSummary,
    pub usage: SlotUsage,
}

/// Which path entered admission. Controls the audit action and lineage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Origin {
    Fresh,
    Restore { historical_id: DbId },
}

#[derive(Clone)]
pub struct AdmissionController {
    pool: PgPool,
    capacity: Arc<dyn CapacityResolver>,
    catalog: Arc<dyn AdCatalog>,
    tx_timeout: Duration,
}

impl AdmissionController {
    pub fn new(
        pool: PgPool,
        capacity: Arc<dyn CapacityResolver>,
        catalog: Arc<dyn AdCatalog>,
        tx_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            capacity,
            catalog,
            tx_timeout,
        }
    }

    /// Admit a request, or fail with the first check it does not pass:
    /// input validation, eligibility, duplicate, capacity.
    pub async fn admit(
        &self,
        request: &AdmissionRequest,
        now: Timestamp,
    ) -> EngineResult<Admission> {
        self.admit_as(request, Origin::Fresh, now).await
    }

    pub(crate) async fn admit_as(
        &self,
        request: &AdmissionRequest,
        origin: Origin,
        now: Timestamp,
    ) -> EngineResult<Admission> {
        let result = self.admit_checked(request, origin, now).await;
        if let Err(e) = &result {
            tracing::info!(
                ad_id = request.ad_id,
                category_id = request.category_id,
                placement = %request.placement,
                error = %e,
                "Admission rejected",
            );
        }
        result
    }

    async fn admit_checked(
        &self,
        request: &AdmissionRequest,
        origin: Origin,
        now: Timestamp,
    ) -> EngineResult<Admission> {
        validate_request(request, now)?;
        self.eligible_ad(request.ad_id).await?;

        let max_slots = self
            .capacity
            .max_slots(request.category_id, request.placement)
            .await;

        match self.try_admit(request, origin, max_slots, now).await {
            Err(e) if e.is_concurrency_conflict() => {
                tracing::warn!(
                    ad_id = request.ad_id,
                    error = %e,
                    "Admission hit a concurrency conflict, retrying once",
                );
                self.try_admit(request, origin, max_slots, now).await
            }
            other => other,
        }
    }

    /// Run checks 1-3 plus a non-locking capacity read.
    ///
    /// Lets the self-service path refuse before debiting. [`admit`](Self::admit)
    /// re-checks everything under the pool lock.
    pub async fn preflight(
        &self,
        request: &AdmissionRequest,
        now: Timestamp,
    ) -> EngineResult<Preflight> {
        validate_request(request, now)?;
        let ad = self.eligible_ad(request.ad_id).await?;

        if FeaturedPlacementRepo::find_live_for(&self.pool, request.ad_id, request.placement)
            .await?
            .is_some()
        {
            return Err(CoreError::AlreadyFeatured {
                ad_id: request.ad_id,
                placement: request.placement,
            }
            .into());
        }

        let usage = self
            .availability(request.category_id, request.placement)
            .await?;
        if usage.is_full() {
            return Err(CoreError::CapacityExceeded {
                occupied: usage.occupied,
                max: usage.max_slots,
            }
            .into());
        }

        Ok(Preflight { ad, usage })
    }

    /// Current occupancy of a slot pool.
    pub async fn availability(
        &self,
        category_id: DbId,
        placement: Placement,
    ) -> EngineResult<SlotUsage> {
        let max_slots = self.capacity.max_slots(category_id, placement).await;
        let occupied =
            FeaturedPlacementRepo::count_occupied(&self.pool, category_id, placement).await?;
        Ok(SlotUsage::new(category_id, placement, occupied, max_slots))
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn eligible_ad(&self, ad_id: DbId) -> EngineResult<AdSummary> {
        let ad = self
            .catalog
            .get_ad(ad_id)
            .await?
            .ok_or_else(|| CoreError::AdNotEligible {
                ad_id,
                reason: "ad does not exist".into(),
            })?;

        if !ad.is_active() {
            return Err(CoreError::AdNotEligible {
                ad_id,
                reason: format!("ad status is '{}'", ad.status),
            }
            .into());
        }
        Ok(ad)
    }

    async fn try_admit(
        &self,
        request: &AdmissionRequest,
        origin: Origin,
        max_slots: i32,
        now: Timestamp,
    ) -> EngineResult<Admission> {
        within(
            self.tx_timeout,
            self.admit_in_tx(request, origin, max_slots, now),
        )
        .await
    }

    async fn admit_in_tx(
        &self,
        request: &AdmissionRequest,
        origin: Origin,
        max_slots: i32,
        now: Timestamp,
    ) -> EngineResult<Admission> {
        let mut tx = self.pool.begin().await?;

        FeaturedPlacementRepo::set_lock_timeout(&mut *tx, lock_timeout_ms(self.tx_timeout))
            .await?;
        FeaturedPlacementRepo::lock_slot_pool(&mut *tx, request.category_id, request.placement)
            .await?;

        if FeaturedPlacementRepo::find_live_for(&mut *tx, request.ad_id, request.placement)
            .await?
            .is_some()
        {
            return Err(CoreError::AlreadyFeatured {
                ad_id: request.ad_id,
                placement: request.placement,
            }
            .into());
        }

        let occupied =
            FeaturedPlacementRepo::count_occupied(&mut *tx, request.category_id, request.placement)
                .await?;
        if occupied >= i64::from(max_slots) {
            return Err(CoreError::CapacityExceeded {
                occupied,
                max: max_slots,
            }
            .into());
        }

        let expires_at = compute_expires_at(request.scheduled_start, request.duration_days)?;
        let status = initial_status(request.scheduled_start, now);
        let immediate = status == FeaturedStatus::Active;
        let new_row = NewFeaturedPlacement {
            ad_id: request.ad_id,
            user_id: request.requested_by.user_id,
            category_id: request.category_id,
            placement: request.placement,
            status,
            scheduled_start: request.scheduled_start,
            actual_start: immediate.then_some(now),
            duration_days: request.duration_days,
            expires_at,
            credit_consumed: request.funding.credit_consumed(),
            credits_spent: request.funding.credits_spent(),
            is_manual: request.funding.is_manual(),
            manual_activated_by: request.funding.manual_activated_by(),
            priority: request.priority,
            notes: request.notes.clone(),
            restored_from_id: match origin {
                Origin::Fresh => None,
                Origin::Restore { historical_id } => Some(historical_id),
            },
        };

        let row = FeaturedPlacementRepo::insert(&mut *tx, &new_row)
            .await
            .map_err(|e| classify_insert_error(e, request))?;

        let entry = admission_audit_entry(request, origin, &row, occupied, max_slots, now);
        audit::append_best_effort(&mut *tx, &[entry]).await;

        tx.commit().await?;

        tracing::info!(
            placement_id = row.id,
            ad_id = row.ad_id,
            category_id = row.category_id,
            placement = %row.placement,
            status = %row.status,
            slots_used = occupied + 1,
            max_slots,
            "Featured placement admitted",
        );

        Ok(Admission {
            placement: row,
            slots_used: occupied + 1,
            max_slots,
            slots_remaining: slots_remaining(max_slots, occupied),
        })
    }
}

/// Input checks that need no I/O.
fn validate_request(request: &AdmissionRequest, now: Timestamp) -> Result<(), CoreError> {
    validate_duration(request.duration_days)?;
    validate_scheduled_start(request.scheduled_start, now)?;
    validate_free_text("notes", request.notes.as_deref())?;
    if request.funding.credits_spent() < 0 {
        return Err(CoreError::Validation(
            "credits_spent must not be negative".into(),
        ));
    }
    Ok(())
}

/// Lock waits get half the transaction budget so they fail as conflicts
/// before the outer timeout fires.
pub(crate) fn lock_timeout_ms(tx_timeout: Duration) -> u64 {
    u64::try_from(tx_timeout.as_millis() / 2)
        .unwrap_or(u64::MAX)
        .max(1)
}

/// Map a unique violation on the live-ad index to `AlreadyFeatured`.
fn classify_insert_error(err: sqlx::Error, request: &AdmissionRequest) -> EngineError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") && db_err.constraint() == Some(LIVE_AD_INDEX)
        {
            return CoreError::AlreadyFeatured {
                ad_id: request.ad_id,
                placement: request.placement,
            }
            .into();
        }
    }
    err.into()
}

fn admission_audit_entry(
    request: &AdmissionRequest,
    origin: Origin,
    row: &FeaturedPlacement,
    occupied_before: i64,
    max_slots: i32,
    now: Timestamp,
) -> CreateFeaturedAuditEntry {
    let mut metadata = audit::transition_metadata(None, row.status);
    metadata["slots_used"] = (occupied_before + 1).into();
    metadata["slots_max"] = max_slots.into();
    metadata["immediate"] = (row.status == FeaturedStatus::Active).into();
    if row.credit_consumed {
        metadata["credits_spent"] = row.credits_spent.into();
    }

    let action = match origin {
        Origin::Fresh => request.funding.activation_action(),
        Origin::Restore { historical_id } => {
            metadata["restored_from"] = historical_id.into();
            AuditAction::Restored
        }
    };

    CreateFeaturedAuditEntry {
        placement_id: row.id,
        ad_id: row.ad_id,
        actor_id: Some(request.requested_by.user_id),
        actor_label: request.requested_by.label.clone(),
        action,
        reason: None,
        metadata,
        occurred_at: now,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn request(duration_days: i32, notes: Option<&str>) -> AdmissionRequest {
        AdmissionRequest {
            ad_id: 1,
            category_id: 1,
            placement: Placement::Homepage,
            scheduled_start: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            duration_days,
            funding: Funding::Manual { granted_by: 9 },
            requested_by: Actor::new(9, None),
            priority: 0,
            notes: notes.map(str::to_string),
        }
    }

    #[test]
    fn rejects_bad_duration() {
        assert!(matches!(
            validate_request(&request(0, None), now()),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn rejects_long_notes() {
        let long = "n".repeat(2001);
        assert!(validate_request(&request(7, Some(&long)), now()).is_err());
        assert!(validate_request(&request(7, Some("ok")), now()).is_ok());
    }

    #[test]
    fn rejects_negative_credit_spend() {
        let mut req = request(7, None);
        req.funding = Funding::SelfService { credits_spent: -1 };
        assert!(validate_request(&req, now()).is_err());
    }

    #[test]
    fn rejects_far_start_date() {
        let mut req = request(7, None);
        req.scheduled_start = NaiveDate::MAX;
        assert!(matches!(
            validate_request(&req, now()),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn lock_timeout_is_half_budget() {
        assert_eq!(lock_timeout_ms(Duration::from_millis(5000)), 2500);
        assert_eq!(lock_timeout_ms(Duration::from_millis(1)), 1);
    }

    #[test]
    fn usage_remaining_and_full() {
        let usage = SlotUsage::new(1, Placement::Results, 3, 4);
        assert_eq!(usage.remaining, 1);
        assert!(!usage.is_full());

        let usage = SlotUsage::new(1, Placement::Results, 5, 4);
        assert_eq!(usage.remaining, 0);
        assert!(usage.is_full());
    }
}
