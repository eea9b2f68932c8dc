//! Lifecycle sweeper: time-driven `pending -> active -> expired` transitions.
//!
//! Each batch is one `UPDATE ... WHERE id IN (SELECT ... FOR UPDATE SKIP
//! LOCKED) RETURNING` committed together with its audit rows. Overlapping
//! sweeps split the due rows between them; the status predicate on every
//! update makes a re-run a no-op.

use std::time::Duration;

use adslot_core::featured::{AuditAction, FeaturedStatus, SYSTEM_ACTOR_LABEL};
use adslot_core::types::Timestamp;
use adslot_db::models::featured_audit::CreateFeaturedAuditEntry;
use adslot_db::models::featured_placement::FeaturedPlacement;
use adslot_db::repositories::{FeaturedAuditRepo, FeaturedPlacementRepo};
use serde::Serialize;
use sqlx::PgPool;

use crate::audit;
use crate::error::{within, EngineResult};

/// Counts produced by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub activated: u64,
    pub expired: u64,
    /// Expiries recorded in the trailing window, including this sweep's.
    /// Informational only.
    pub recently_expired: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Activate,
    Expire,
}

impl Phase {
    fn action(self) -> AuditAction {
        match self {
            Phase::Activate => AuditAction::ActivatedBySweep,
            Phase::Expire => AuditAction::ExpiredBySweep,
        }
    }

    fn transition(self) -> (FeaturedStatus, FeaturedStatus) {
        match self {
            Phase::Activate => (FeaturedStatus::Pending, FeaturedStatus::Active),
            Phase::Expire => (FeaturedStatus::Active, FeaturedStatus::Expired),
        }
    }
}

#[derive(Clone)]
pub struct LifecycleSweeper {
    pool: PgPool,
    window: Duration,
    batch_size: i64,
    tx_timeout: Duration,
}

impl LifecycleSweeper {
    pub fn new(pool: PgPool, window: Duration, batch_size: i64, tx_timeout: Duration) -> Self {
        Self {
            pool,
            window,
            batch_size: batch_size.max(1),
            tx_timeout,
        }
    }

    /// Activate due pending rows, then expire due active rows.
    ///
    /// Activation runs first so a row due for both ends `expired`.
    pub async fn sweep(&self, now: Timestamp) -> EngineResult<SweepReport> {
        let activated = self.run_phase(Phase::Activate, now).await?;
        let expired = self.run_phase(Phase::Expire, now).await?;
        let recently_expired = self.recently_expired(now).await;

        tracing::info!(activated, expired, recently_expired, "Featured sweep complete");

        Ok(SweepReport {
            activated,
            expired,
            recently_expired,
        })
    }

    async fn run_phase(&self, phase: Phase, now: Timestamp) -> EngineResult<u64> {
        let mut total = 0u64;
        loop {
            let transitioned = within(self.tx_timeout, self.run_batch(phase, now)).await?;
            total += transitioned as u64;
            if (transitioned as i64) < self.batch_size {
                break;
            }
        }
        Ok(total)
    }

    async fn run_batch(&self, phase: Phase, now: Timestamp) -> EngineResult<usize> {
        let mut tx = self.pool.begin().await?;

        let rows = match phase {
            Phase::Activate => {
                FeaturedPlacementRepo::activate_due(&mut *tx, now.date_naive(), now, self.batch_size)
                    .await?
            }
            Phase::Expire => {
                FeaturedPlacementRepo::expire_due(&mut *tx, now, self.batch_size).await?
            }
        };

        let entries: Vec<_> = rows.iter().map(|row| sweep_entry(row, phase, now)).collect();
        audit::append_best_effort(&mut *tx, &entries).await;

        tx.commit().await?;

        for row in &rows {
            tracing::debug!(
                placement_id = row.id,
                ad_id = row.ad_id,
                action = %phase.action(),
                "Sweep transitioned placement",
            );
        }
        Ok(rows.len())
    }

    /// Count of `expired_by_sweep` entries in `(now - window, now]`.
    ///
    /// Failures are logged and reported as zero.
    async fn recently_expired(&self, now: Timestamp) -> i64 {
        let window = chrono::Duration::from_std(self.window).unwrap_or(chrono::Duration::zero());
        match FeaturedAuditRepo::count_action_between(
            &self.pool,
            AuditAction::ExpiredBySweep,
            now - window,
            now,
        )
        .await
        {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to count recent expiries");
                0
            }
        }
    }
}

fn sweep_entry(row: &FeaturedPlacement, phase: Phase, now: Timestamp) -> CreateFeaturedAuditEntry {
    let (prior, new) = phase.transition();
    let mut metadata = audit::transition_metadata(Some(prior), new);
    if phase == Phase::Expire {
        metadata["expires_at"] = row.expires_at.to_rfc3339().into();
    }

    CreateFeaturedAuditEntry {
        placement_id: row.id,
        ad_id: row.ad_id,
        actor_id: None,
        actor_label: SYSTEM_ACTOR_LABEL.to_string(),
        action: phase.action(),
        reason: None,
        metadata,
        occurred_at: now,
    }
}
