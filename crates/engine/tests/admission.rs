//! Integration tests for the admission controller.

mod common;

use std::sync::Arc;
use std::time::Duration;

use adslot_core::error::CoreError;
use adslot_core::featured::{AuditAction, FeaturedStatus, Funding, Placement};
use adslot_db::repositories::{FeaturedAuditRepo, FeaturedPlacementRepo, PlatformSettingRepo};
use adslot_engine::{
    Actor, EngineConfig, EngineError, FeaturedEngine, FixedCapacity, PgAdCatalog, PgCreditLedger,
    SettingsCapacityResolver,
};
use assert_matches::assert_matches;
use chrono::NaiveDate;
use common::*;
use futures::future::join_all;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Test: start today activates immediately
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn start_today_is_active_immediately(pool: PgPool) {
    let engine = engine_with_capacity(&pool, 10);
    let ad = seed_ad(&pool, 1, "active").await;
    let now = ts(2026, 3, 1, 12);

    let admission = engine
        .admission
        .admit(&manual_request(&ad, Placement::Homepage, date(2026, 3, 1), 7), now)
        .await
        .unwrap();

    let row = &admission.placement;
    assert_eq!(row.status, FeaturedStatus::Active);
    assert_eq!(row.actual_start, Some(now));
    assert_eq!(row.expires_at, ts(2026, 3, 8, 0));
    assert!(row.is_manual);
    assert!(!row.credit_consumed);
    assert_eq!(row.credits_spent, 0);
    assert_eq!(row.manual_activated_by, Some(ADMIN_ID));
    assert_eq!(admission.slots_used, 1);
    assert_eq!(admission.max_slots, 10);
    assert_eq!(admission.slots_remaining, 9);
}

// ---------------------------------------------------------------------------
// Test: future start stays pending
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn future_start_is_pending(pool: PgPool) {
    let engine = engine_with_capacity(&pool, 10);
    let ad = seed_ad(&pool, 1, "active").await;

    let admission = engine
        .admission
        .admit(
            &manual_request(&ad, Placement::Results, date(2026, 3, 5), 3),
            ts(2026, 3, 1, 12),
        )
        .await
        .unwrap();

    assert_eq!(admission.placement.status, FeaturedStatus::Pending);
    assert!(admission.placement.actual_start.is_none());
    assert_eq!(admission.placement.expires_at, ts(2026, 3, 8, 0));
}

// ---------------------------------------------------------------------------
// Test: pending rows occupy capacity
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn full_pool_rejects_with_snapshot(pool: PgPool) {
    let engine = engine_with_capacity(&pool, 2);
    let now = ts(2026, 3, 1, 12);

    for start in [date(2026, 3, 1), date(2026, 4, 1)] {
        let ad = seed_ad(&pool, 7, "active").await;
        engine
            .admission
            .admit(&manual_request(&ad, Placement::Detail, start, 5), now)
            .await
            .unwrap();
    }

    let third = seed_ad(&pool, 7, "active").await;
    let err = engine
        .admission
        .admit(&manual_request(&third, Placement::Detail, date(2026, 3, 1), 5), now)
        .await
        .unwrap_err();

    assert_matches!(
        err,
        EngineError::Core(CoreError::CapacityExceeded { occupied: 2, max: 2 })
    );
    assert!(FeaturedPlacementRepo::find_live_for(&pool, third.id, Placement::Detail)
        .await
        .unwrap()
        .is_none());
}

// ---------------------------------------------------------------------------
// Test: pools are scoped by category and placement
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn other_pools_are_unaffected(pool: PgPool) {
    let engine = engine_with_capacity(&pool, 1);
    let now = ts(2026, 3, 1, 12);

    let first = seed_ad(&pool, 1, "active").await;
    engine
        .admission
        .admit(&manual_request(&first, Placement::Homepage, date(2026, 3, 1), 5), now)
        .await
        .unwrap();

    // Same ad, different placement.
    engine
        .admission
        .admit(&manual_request(&first, Placement::Results, date(2026, 3, 1), 5), now)
        .await
        .unwrap();

    // Different category, same placement.
    let other = seed_ad(&pool, 2, "active").await;
    engine
        .admission
        .admit(&manual_request(&other, Placement::Homepage, date(2026, 3, 1), 5), now)
        .await
        .unwrap();
}

// ---------------------------------------------------------------------------
// Test: duplicate live placement is rejected
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn duplicate_is_already_featured(pool: PgPool) {
    let engine = engine_with_capacity(&pool, 10);
    let ad = seed_ad(&pool, 1, "active").await;
    let now = ts(2026, 3, 1, 12);

    engine
        .admission
        .admit(&manual_request(&ad, Placement::Homepage, date(2026, 3, 10), 5), now)
        .await
        .unwrap();

    let err = engine
        .admission
        .admit(&manual_request(&ad, Placement::Homepage, date(2026, 3, 1), 5), now)
        .await
        .unwrap_err();

    assert_matches!(
        err,
        EngineError::Core(CoreError::AlreadyFeatured {
            placement: Placement::Homepage,
            ..
        })
    );
}

// ---------------------------------------------------------------------------
// Test: duplicate check runs before capacity
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn duplicate_reported_before_capacity(pool: PgPool) {
    let engine = engine_with_capacity(&pool, 1);
    let ad = seed_ad(&pool, 1, "active").await;
    let now = ts(2026, 3, 1, 12);
    let request = manual_request(&ad, Placement::Homepage, date(2026, 3, 1), 5);

    engine.admission.admit(&request, now).await.unwrap();
    let err = engine.admission.admit(&request, now).await.unwrap_err();

    assert_matches!(err, EngineError::Core(CoreError::AlreadyFeatured { .. }));
}

// ---------------------------------------------------------------------------
// Test: ineligible ads
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn inactive_ad_is_not_eligible(pool: PgPool) {
    let engine = engine_with_capacity(&pool, 10);
    let ad = seed_ad(&pool, 1, "sold").await;

    let err = engine
        .admission
        .admit(
            &manual_request(&ad, Placement::Homepage, date(2026, 3, 1), 5),
            ts(2026, 3, 1, 12),
        )
        .await
        .unwrap_err();

    assert_matches!(err, EngineError::Core(CoreError::AdNotEligible { reason, .. }) => {
        assert!(reason.contains("sold"));
    });
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn missing_ad_is_not_eligible(pool: PgPool) {
    let engine = engine_with_capacity(&pool, 10);
    let mut request = manual_request(
        &seed_ad(&pool, 1, "active").await,
        Placement::Homepage,
        date(2026, 3, 1),
        5,
    );
    request.ad_id = 999_999;

    let err = engine
        .admission
        .admit(&request, ts(2026, 3, 1, 12))
        .await
        .unwrap_err();

    assert_matches!(
        err,
        EngineError::Core(CoreError::AdNotEligible { ad_id: 999_999, .. })
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn invalid_duration_is_validation_error(pool: PgPool) {
    let engine = engine_with_capacity(&pool, 10);
    let ad = seed_ad(&pool, 1, "active").await;

    let err = engine
        .admission
        .admit(
            &manual_request(&ad, Placement::Homepage, date(2026, 3, 1), 0),
            ts(2026, 3, 1, 12),
        )
        .await
        .unwrap_err();

    assert_matches!(err, EngineError::Core(CoreError::Validation(_)));
}

// ---------------------------------------------------------------------------
// Test: self-service funding
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn self_service_records_credit_spend(pool: PgPool) {
    let engine = engine_with_capacity(&pool, 10);
    let ad = seed_ad(&pool, 1, "active").await;
    let now = ts(2026, 3, 1, 12);

    let mut request = manual_request(&ad, Placement::Results, date(2026, 3, 1), 7);
    request.funding = Funding::SelfService { credits_spent: 14 };
    request.requested_by = Actor::new(ad.user_id, None);

    let admission = engine.admission.admit(&request, now).await.unwrap();
    let row = &admission.placement;
    assert!(row.credit_consumed);
    assert!(!row.is_manual);
    assert_eq!(row.credits_spent, 14);
    assert_eq!(row.manual_activated_by, None);
    assert_eq!(row.user_id, ad.user_id);

    let trail = FeaturedAuditRepo::list_for_placement(&pool, row.id)
        .await
        .unwrap();
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].action, AuditAction::SelfServiceActivation);
    assert_eq!(trail[0].actor_label, format!("user:{}", ad.user_id));
    assert_eq!(trail[0].metadata["credits_spent"], 14);
}

// ---------------------------------------------------------------------------
// Test: audit snapshot
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn admission_writes_snapshot_entry(pool: PgPool) {
    let engine = engine_with_capacity(&pool, 4);
    let now = ts(2026, 3, 1, 12);

    let first = seed_ad(&pool, 3, "active").await;
    engine
        .admission
        .admit(&manual_request(&first, Placement::Results, date(2026, 3, 1), 5), now)
        .await
        .unwrap();

    let second = seed_ad(&pool, 3, "active").await;
    let admission = engine
        .admission
        .admit(&manual_request(&second, Placement::Results, date(2026, 3, 9), 5), now)
        .await
        .unwrap();

    let trail = FeaturedAuditRepo::list_for_placement(&pool, admission.placement.id)
        .await
        .unwrap();
    assert_eq!(trail.len(), 1);
    let entry = &trail[0];
    assert_eq!(entry.action, AuditAction::ManualActivation);
    assert_eq!(entry.actor_id, Some(ADMIN_ID));
    assert_eq!(entry.actor_label, "admin@example.com");
    assert_eq!(entry.occurred_at, now);
    assert_eq!(entry.metadata["slots_used"], 2);
    assert_eq!(entry.metadata["slots_max"], 4);
    assert_eq!(entry.metadata["new_status"], "pending");
    assert_eq!(entry.metadata["immediate"], false);
}

// ---------------------------------------------------------------------------
// Test: settings-backed capacity
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn category_override_limits_pool(pool: PgPool) {
    PlatformSettingRepo::upsert(&pool, "featured_slots_homepage", "5", None)
        .await
        .unwrap();
    PlatformSettingRepo::upsert(&pool, "featured_slots_homepage_category_8", "1", None)
        .await
        .unwrap();

    let engine = engine_with_resolver(&pool, Arc::new(SettingsCapacityResolver::new(pool.clone())));
    let now = ts(2026, 3, 1, 12);

    let first = seed_ad(&pool, 8, "active").await;
    let admission = engine
        .admission
        .admit(&manual_request(&first, Placement::Homepage, date(2026, 3, 1), 5), now)
        .await
        .unwrap();
    assert_eq!(admission.max_slots, 1);
    assert_eq!(admission.slots_remaining, 0);

    let second = seed_ad(&pool, 8, "active").await;
    let err = engine
        .admission
        .admit(&manual_request(&second, Placement::Homepage, date(2026, 3, 1), 5), now)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        EngineError::Core(CoreError::CapacityExceeded { occupied: 1, max: 1 })
    );

    // Category 9 has no override and uses the global limit.
    let usage = engine
        .admission
        .availability(9, Placement::Homepage)
        .await
        .unwrap();
    assert_eq!(usage.max_slots, 5);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn malformed_setting_uses_default(pool: PgPool) {
    PlatformSettingRepo::upsert(&pool, "featured_slots_results", "lots", None)
        .await
        .unwrap();

    let engine = engine_with_resolver(&pool, Arc::new(SettingsCapacityResolver::new(pool.clone())));
    let usage = engine
        .admission
        .availability(1, Placement::Results)
        .await
        .unwrap();
    assert_eq!(usage.max_slots, 4);
    assert_eq!(usage.occupied, 0);
    assert_eq!(usage.remaining, 4);
}

// ---------------------------------------------------------------------------
// Test: preflight
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn preflight_refuses_full_pool(pool: PgPool) {
    let engine = engine_with_capacity(&pool, 1);
    let now = ts(2026, 3, 1, 12);

    let first = seed_ad(&pool, 1, "active").await;
    let ok = engine
        .admission
        .preflight(&manual_request(&first, Placement::Detail, date(2026, 3, 1), 5), now)
        .await
        .unwrap();
    assert_eq!(ok.ad.id, first.id);
    assert_eq!(ok.usage.remaining, 1);

    engine
        .admission
        .admit(&manual_request(&first, Placement::Detail, date(2026, 3, 1), 5), now)
        .await
        .unwrap();

    let second = seed_ad(&pool, 1, "active").await;
    let err = engine
        .admission
        .preflight(&manual_request(&second, Placement::Detail, date(2026, 3, 1), 5), now)
        .await
        .unwrap_err();
    assert_matches!(err, EngineError::Core(CoreError::CapacityExceeded { .. }));

    let err = engine
        .admission
        .preflight(&manual_request(&first, Placement::Detail, date(2026, 3, 1), 5), now)
        .await
        .unwrap_err();
    assert_matches!(err, EngineError::Core(CoreError::AlreadyFeatured { .. }));
}

// ---------------------------------------------------------------------------
// Test: concurrent admissions never oversell
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn concurrent_admissions_respect_capacity(pool: PgPool) {
    let engine = engine_with_capacity(&pool, 3);
    let now = ts(2026, 3, 1, 12);

    let mut requests = Vec::new();
    for _ in 0..8 {
        let ad = seed_ad(&pool, 5, "active").await;
        requests.push(manual_request(&ad, Placement::Homepage, date(2026, 3, 1), 5));
    }

    let results = join_all(
        requests
            .iter()
            .map(|request| engine.admission.admit(request, now)),
    )
    .await;

    let admitted = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(admitted, 3);
    for err in results.into_iter().filter_map(Result::err) {
        assert_matches!(
            err,
            EngineError::Core(CoreError::CapacityExceeded { max: 3, .. })
                | EngineError::Core(CoreError::ConcurrencyConflict(_))
        );
    }

    let occupied = FeaturedPlacementRepo::count_occupied(&pool, 5, Placement::Homepage)
        .await
        .unwrap();
    assert_eq!(occupied, 3);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn concurrent_duplicates_admit_once(pool: PgPool) {
    let engine = engine_with_capacity(&pool, 10);
    let ad = seed_ad(&pool, 1, "active").await;
    let request = manual_request(&ad, Placement::Results, date(2026, 3, 1), 5);
    let now = ts(2026, 3, 1, 12);

    let results = join_all((0..5).map(|_| engine.admission.admit(&request, now))).await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let occupied = FeaturedPlacementRepo::count_occupied(&pool, 1, Placement::Results)
        .await
        .unwrap();
    assert_eq!(occupied, 1);
}

// ---------------------------------------------------------------------------
// Test: an audit write failure does not undo the admission
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn failed_audit_write_keeps_admission(pool: PgPool) {
    sqlx::query(
        "CREATE FUNCTION fail_audit_insert() RETURNS TRIGGER AS $$ \
         BEGIN RAISE EXCEPTION 'audit store unavailable'; END; \
         $$ LANGUAGE plpgsql",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "CREATE TRIGGER trg_fail_audit_insert BEFORE INSERT ON featured_audit_log \
         FOR EACH STATEMENT EXECUTE FUNCTION fail_audit_insert()",
    )
    .execute(&pool)
    .await
    .unwrap();

    let engine = engine_with_capacity(&pool, 10);
    let ad = seed_ad(&pool, 1, "active").await;
    let admission = engine
        .admission
        .admit(
            &manual_request(&ad, Placement::Homepage, date(2026, 3, 1), 5),
            ts(2026, 3, 1, 12),
        )
        .await
        .unwrap();

    let row = FeaturedPlacementRepo::find_by_id(&pool, admission.placement.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status, FeaturedStatus::Active);

    let trail = FeaturedAuditRepo::list_for_placement(&pool, row.id)
        .await
        .unwrap();
    assert!(trail.is_empty());
}

// ---------------------------------------------------------------------------
// Test: a held pool lock fails retryably and commits nothing
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn held_pool_lock_fails_without_commit(pool: PgPool) {
    let config = EngineConfig {
        tx_timeout: Duration::from_millis(200),
        ..EngineConfig::default()
    };
    let engine = FeaturedEngine::with_collaborators(
        pool.clone(),
        &config,
        Arc::new(FixedCapacity(10)),
        Arc::new(PgAdCatalog::new(pool.clone())),
        Arc::new(PgCreditLedger::new(pool.clone())),
    );
    let ad = seed_ad(&pool, 1, "active").await;

    let mut holder = pool.begin().await.unwrap();
    FeaturedPlacementRepo::lock_slot_pool(&mut *holder, 1, Placement::Homepage)
        .await
        .unwrap();

    let err = engine
        .admission
        .admit(
            &manual_request(&ad, Placement::Homepage, date(2026, 3, 1), 5),
            ts(2026, 3, 1, 12),
        )
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert_matches!(
        err,
        EngineError::Timeout(_) | EngineError::Core(CoreError::ConcurrencyConflict(_))
    );

    holder.rollback().await.unwrap();

    let live = FeaturedPlacementRepo::find_live_for(&pool, ad.id, Placement::Homepage)
        .await
        .unwrap();
    assert!(live.is_none());
    assert_eq!(
        FeaturedPlacementRepo::count_occupied(&pool, 1, Placement::Homepage)
            .await
            .unwrap(),
        0
    );
}

// ---------------------------------------------------------------------------
// Test: start dates far from today are rejected
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn start_date_out_of_range_is_validation_error(pool: PgPool) {
    let engine = engine_with_capacity(&pool, 10);
    let ad = seed_ad(&pool, 1, "active").await;

    for start in [NaiveDate::MAX, date(2028, 1, 1), date(2024, 1, 1)] {
        let err = engine
            .admission
            .admit(
                &manual_request(&ad, Placement::Homepage, start, 5),
                ts(2026, 3, 1, 12),
            )
            .await
            .unwrap_err();
        assert_matches!(err, EngineError::Core(CoreError::Validation(_)));
    }
}
