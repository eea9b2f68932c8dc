//! Repository for the `featured_placements` table (the slot ledger).
//!
//! Methods that participate in admission, cancellation, or the sweep take a
//! generic [`PgExecutor`] so callers can run them inside a transaction
//! (`&mut *tx`). Read-only listing helpers take `&PgPool`.
//!
//! "Live" rows are those with status `pending` or `active`; they are the
//! rows that occupy a slot.

use adslot_core::capacity::slot_lock_key;
use adslot_core::featured::{FeaturedStatus, Placement};
use adslot_core::types::{DbId, Timestamp};
use chrono::NaiveDate;
use sqlx::{PgExecutor, PgPool};

use crate::models::featured_placement::{
    FeaturedPlacement, FeaturedPlacementQuery, NewFeaturedPlacement,
};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "\
    id, ad_id, user_id, category_id, placement, status, \
    scheduled_start, actual_start, duration_days, expires_at, \
    credit_consumed, credits_spent, is_manual, manual_activated_by, \
    priority, notes, cancellation_reason, cancelled_by, cancelled_at, \
    refunded, restored_from_id, created_at, updated_at";

/// SQL predicate selecting rows that occupy a slot.
const LIVE_PREDICATE: &str = "status IN ('pending', 'active')";

/// Maximum page size for listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for listing.
const DEFAULT_LIMIT: i64 = 50;

/// Provides slot-ledger operations for featured placements.
pub struct FeaturedPlacementRepo;

impl FeaturedPlacementRepo {
    // -----------------------------------------------------------------------
    // Locking
    // -----------------------------------------------------------------------

    /// Bound how long statements in the current transaction wait for locks.
    ///
    /// Uses `set_config(..., true)` so the setting is transaction-local.
    pub async fn set_lock_timeout<'e, E: PgExecutor<'e>>(
        executor: E,
        timeout_ms: u64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{timeout_ms}ms"))
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Take the transaction-scoped advisory lock for a `(category, placement)`
    /// slot pool.
    ///
    /// Serializes admissions and cancellations on the same pool; pools with
    /// different keys proceed in parallel. Released at commit or rollback.
    pub async fn lock_slot_pool<'e, E: PgExecutor<'e>>(
        executor: E,
        category_id: DbId,
        placement: Placement,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(slot_lock_key(category_id, placement))
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Fetch a row and hold a row lock on it until the transaction ends.
    pub async fn find_by_id_for_update<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
    ) -> Result<Option<FeaturedPlacement>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM featured_placements WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, FeaturedPlacement>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    // -----------------------------------------------------------------------
    // Admission
    // -----------------------------------------------------------------------

    /// Count rows occupying a slot in the given `(category, placement)` pool.
    pub async fn count_occupied<'e, E: PgExecutor<'e>>(
        executor: E,
        category_id: DbId,
        placement: Placement,
    ) -> Result<i64, sqlx::Error> {
        let query = format!(
            "SELECT COUNT(*)::BIGINT FROM featured_placements \
             WHERE category_id = $1 AND placement = $2 AND {LIVE_PREDICATE}"
        );
        sqlx::query_scalar::<_, i64>(&query)
            .bind(category_id)
            .bind(placement.as_str())
            .fetch_one(executor)
            .await
    }

    /// Find the live row (if any) for an ad on a placement.
    pub async fn find_live_for<'e, E: PgExecutor<'e>>(
        executor: E,
        ad_id: DbId,
        placement: Placement,
    ) -> Result<Option<FeaturedPlacement>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM featured_placements \
             WHERE ad_id = $1 AND placement = $2 AND {LIVE_PREDICATE}"
        );
        sqlx::query_as::<_, FeaturedPlacement>(&query)
            .bind(ad_id)
            .bind(placement.as_str())
            .fetch_optional(executor)
            .await
    }

    /// Insert a new ledger row.
    ///
    /// Must run inside the admission transaction after
    /// [`lock_slot_pool`](Self::lock_slot_pool) and the capacity check.
    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        input: &NewFeaturedPlacement,
    ) -> Result<FeaturedPlacement, sqlx::Error> {
        let query = format!(
            "INSERT INTO featured_placements \
                (ad_id, user_id, category_id, placement, status, scheduled_start, \
                 actual_start, duration_days, expires_at, credit_consumed, credits_spent, \
                 is_manual, manual_activated_by, priority, notes, restored_from_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, FeaturedPlacement>(&query)
            .bind(input.ad_id)
            .bind(input.user_id)
            .bind(input.category_id)
            .bind(input.placement.as_str())
            .bind(input.status.as_str())
            .bind(input.scheduled_start)
            .bind(input.actual_start)
            .bind(input.duration_days)
            .bind(input.expires_at)
            .bind(input.credit_consumed)
            .bind(input.credits_spent)
            .bind(input.is_manual)
            .bind(input.manual_activated_by)
            .bind(input.priority)
            .bind(&input.notes)
            .bind(input.restored_from_id)
            .fetch_one(executor)
            .await
    }

    // -----------------------------------------------------------------------
    // Cancellation
    // -----------------------------------------------------------------------

    /// Cancel a live row. Returns `None` if the row is not live.
    ///
    /// `refunded` is always written as `false`: administrative cancellation
    /// never refunds.
    pub async fn mark_cancelled<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
        cancelled_by: DbId,
        reason: Option<&str>,
        cancelled_at: Timestamp,
    ) -> Result<Option<FeaturedPlacement>, sqlx::Error> {
        let query = format!(
            "UPDATE featured_placements \
             SET status = $2, cancelled_by = $3, cancellation_reason = $4, \
                 cancelled_at = $5, refunded = false \
             WHERE id = $1 AND {LIVE_PREDICATE} \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, FeaturedPlacement>(&query)
            .bind(id)
            .bind(FeaturedStatus::Cancelled.as_str())
            .bind(cancelled_by)
            .bind(reason)
            .bind(cancelled_at)
            .fetch_optional(executor)
            .await
    }

    // -----------------------------------------------------------------------
    // Sweep
    // -----------------------------------------------------------------------

    /// Activate up to `batch_size` pending rows whose start date has arrived.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so overlapping sweeps split the
    /// work instead of transitioning the same row twice. `actual_start` is
    /// set to `now`, the time of the sweep that observed the row.
    pub async fn activate_due<'e, E: PgExecutor<'e>>(
        executor: E,
        today: NaiveDate,
        now: Timestamp,
        batch_size: i64,
    ) -> Result<Vec<FeaturedPlacement>, sqlx::Error> {
        let query = format!(
            "UPDATE featured_placements \
             SET status = 'active', actual_start = $2 \
             WHERE status = 'pending' AND id IN ( \
                 SELECT id FROM featured_placements \
                 WHERE status = 'pending' AND scheduled_start <= $1 \
                 ORDER BY scheduled_start, id \
                 LIMIT $3 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, FeaturedPlacement>(&query)
            .bind(today)
            .bind(now)
            .bind(batch_size)
            .fetch_all(executor)
            .await
    }

    /// Expire up to `batch_size` active rows whose expiry has passed.
    pub async fn expire_due<'e, E: PgExecutor<'e>>(
        executor: E,
        now: Timestamp,
        batch_size: i64,
    ) -> Result<Vec<FeaturedPlacement>, sqlx::Error> {
        let query = format!(
            "UPDATE featured_placements \
             SET status = 'expired' \
             WHERE status = 'active' AND id IN ( \
                 SELECT id FROM featured_placements \
                 WHERE status = 'active' AND expires_at <= $1 \
                 ORDER BY expires_at, id \
                 LIMIT $2 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, FeaturedPlacement>(&query)
            .bind(now)
            .bind(batch_size)
            .fetch_all(executor)
            .await
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Find a placement by ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<FeaturedPlacement>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM featured_placements WHERE id = $1");
        sqlx::query_as::<_, FeaturedPlacement>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List placements with optional filters, newest first.
    pub async fn list(
        pool: &PgPool,
        params: &FeaturedPlacementQuery,
    ) -> Result<Vec<FeaturedPlacement>, sqlx::Error> {
        let limit = clamp_limit(params.limit);
        let offset = params.offset.unwrap_or(0).max(0);

        let query = format!(
            "SELECT {COLUMNS} FROM featured_placements \
             WHERE ($1::TEXT IS NULL OR status = $1) \
               AND ($2::TEXT IS NULL OR placement = $2) \
               AND ($3::BIGINT IS NULL OR category_id = $3) \
               AND ($4::BIGINT IS NULL OR ad_id = $4) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $5 OFFSET $6"
        );
        sqlx::query_as::<_, FeaturedPlacement>(&query)
            .bind(params.status.map(FeaturedStatus::as_str))
            .bind(params.placement.map(Placement::as_str))
            .bind(params.category_id)
            .bind(params.ad_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Active rows for a surface in display order.
    ///
    /// `priority` only breaks ties for display; it never affects admission.
    pub async fn list_active_for_display(
        pool: &PgPool,
        category_id: DbId,
        placement: Placement,
    ) -> Result<Vec<FeaturedPlacement>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM featured_placements \
             WHERE category_id = $1 AND placement = $2 AND status = 'active' \
             ORDER BY priority DESC, actual_start ASC, id ASC"
        );
        sqlx::query_as::<_, FeaturedPlacement>(&query)
            .bind(category_id)
            .bind(placement.as_str())
            .fetch_all(pool)
            .await
    }
}

/// Clamp a requested page size into `1..=MAX_LIMIT`.
fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}
