//! Administrative cancellation and restoration of placements.

use std::time::Duration;

use adslot_core::error::CoreError;
use adslot_core::featured::{
    state_machine, validate_free_text, AuditAction, FeaturedStatus, Funding,
};
use adslot_core::types::{DbId, Timestamp};
use adslot_db::models::featured_audit::CreateFeaturedAuditEntry;
use adslot_db::models::featured_placement::FeaturedPlacement;
use adslot_db::repositories::FeaturedPlacementRepo;
use sqlx::PgPool;

use crate::admission::{
    lock_timeout_ms, Admission, AdmissionController, AdmissionRequest, Origin,
};
use crate::audit::{self, Actor};
use crate::error::{within, EngineResult};

const ENTITY: &str = "FeaturedPlacement";

#[derive(Clone)]
pub struct CancellationManager {
    pool: PgPool,
    admission: AdmissionController,
    tx_timeout: Duration,
}

impl CancellationManager {
    pub fn new(pool: PgPool, admission: AdmissionController, tx_timeout: Duration) -> Self {
        Self {
            pool,
            admission,
            tx_timeout,
        }
    }

    /// Cancel a pending or active placement. Never refunds.
    pub async fn cancel(
        &self,
        id: DbId,
        actor: &Actor,
        reason: Option<&str>,
        now: Timestamp,
    ) -> EngineResult<FeaturedPlacement> {
        validate_free_text("reason", reason)?;

        match within(self.tx_timeout, self.cancel_in_tx(id, actor, reason, now)).await {
            Err(e) if e.is_concurrency_conflict() => {
                tracing::warn!(placement_id = id, error = %e, "Cancel conflicted, retrying once");
                within(self.tx_timeout, self.cancel_in_tx(id, actor, reason, now)).await
            }
            other => other,
        }
    }

    /// Re-admit the ad of a historical placement, starting today.
    ///
    /// Goes through the full admission path with manual funding granted by
    /// `actor`. The historical row is left untouched.
    pub async fn restore_from_history(
        &self,
        historical_id: DbId,
        actor: &Actor,
        now: Timestamp,
    ) -> EngineResult<Admission> {
        let historical = FeaturedPlacementRepo::find_by_id(&self.pool, historical_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: ENTITY,
                id: historical_id,
            })?;

        let request = AdmissionRequest {
            ad_id: historical.ad_id,
            category_id: historical.category_id,
            placement: historical.placement,
            scheduled_start: now.date_naive(),
            duration_days: historical.duration_days,
            funding: Funding::Manual {
                granted_by: actor.user_id,
            },
            requested_by: actor.clone(),
            priority: historical.priority,
            notes: historical.notes.clone(),
        };

        self.admission
            .admit_as(&request, Origin::Restore { historical_id }, now)
            .await
    }

    async fn cancel_in_tx(
        &self,
        id: DbId,
        actor: &Actor,
        reason: Option<&str>,
        now: Timestamp,
    ) -> EngineResult<FeaturedPlacement> {
        // Category and placement never change, so an unlocked read is enough
        // to pick the pool lock.
        let current = FeaturedPlacementRepo::find_by_id(&self.pool, id)
            .await?
            .ok_or(CoreError::NotFound { entity: ENTITY, id })?;

        let mut tx = self.pool.begin().await?;
        FeaturedPlacementRepo::set_lock_timeout(&mut *tx, lock_timeout_ms(self.tx_timeout)).await?;
        FeaturedPlacementRepo::lock_slot_pool(&mut *tx, current.category_id, current.placement)
            .await?;

        let row = FeaturedPlacementRepo::find_by_id_for_update(&mut *tx, id)
            .await?
            .ok_or(CoreError::NotFound { entity: ENTITY, id })?;

        state_machine::validate_transition(row.status, FeaturedStatus::Cancelled).map_err(
            |_| {
                CoreError::Validation(format!(
                    "Placement {id} cannot be cancelled: status is '{}'",
                    row.status
                ))
            },
        )?;

        let cancelled =
            FeaturedPlacementRepo::mark_cancelled(&mut *tx, id, actor.user_id, reason, now)
                .await?
                .ok_or_else(|| {
                    CoreError::ConcurrencyConflict(format!("Placement {id} changed during cancel"))
                })?;

        let mut metadata = audit::transition_metadata(Some(row.status), FeaturedStatus::Cancelled);
        metadata["refunded"] = false.into();
        let entry = CreateFeaturedAuditEntry {
            placement_id: cancelled.id,
            ad_id: cancelled.ad_id,
            actor_id: Some(actor.user_id),
            actor_label: actor.label.clone(),
            action: AuditAction::CancelledByAdmin,
            reason: reason.map(str::to_string),
            metadata,
            occurred_at: now,
        };
        audit::append_best_effort(&mut *tx, &[entry]).await;

        tx.commit().await?;

        tracing::info!(
            placement_id = id,
            ad_id = cancelled.ad_id,
            prior_status = %row.status,
            cancelled_by = actor.user_id,
            "Featured placement cancelled",
        );
        Ok(cancelled)
    }
}
