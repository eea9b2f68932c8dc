//! Integration tests for self-service purchases (debit, admit, refund).

mod common;

use std::sync::Arc;

use adslot_core::error::CoreError;
use adslot_core::featured::{Funding, Placement};
use adslot_core::types::{DbId, Timestamp};
use adslot_db::models::ad::Ad;
use adslot_db::repositories::{FeaturedPlacementRepo, UserCreditRepo};
use adslot_engine::{
    Actor, AdmissionController, AdmissionRequest, CreditLedger, Debit, EngineConfig,
    EngineError, EngineResult, FeaturedEngine, FixedCapacity, PgAdCatalog, PgCreditLedger,
};
use assert_matches::assert_matches;
use async_trait::async_trait;
use common::*;
use sqlx::PgPool;

/// Owner of every ad seeded by `seed_ad`.
const OWNER_ID: DbId = 10;

fn self_service_request(ad: &Ad, credits_spent: i32) -> AdmissionRequest {
    let mut request = manual_request(ad, Placement::Homepage, date(2026, 3, 1), 5);
    request.funding = Funding::SelfService { credits_spent };
    request.requested_by = Actor::new(OWNER_ID, None);
    request
}

/// Ledger that lets a competing admission take the last slot right after
/// the debit goes through.
struct ContestedLedger {
    inner: PgCreditLedger,
    rival: AdmissionController,
    rival_request: AdmissionRequest,
    now: Timestamp,
}

#[async_trait]
impl CreditLedger for ContestedLedger {
    async fn debit(&self, user_id: DbId, amount: i32) -> EngineResult<Debit> {
        let debit = self.inner.debit(user_id, amount).await?;
        self.rival.admit(&self.rival_request, self.now).await?;
        Ok(debit)
    }

    async fn refund(&self, user_id: DbId, amount: i32) -> EngineResult<()> {
        self.inner.refund(user_id, amount).await
    }
}

// ---------------------------------------------------------------------------
// Test: a purchase debits and admits
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn purchase_debits_and_admits(pool: PgPool) {
    let engine = engine_with_capacity(&pool, 10);
    let ad = seed_ad(&pool, 1, "active").await;
    UserCreditRepo::grant(&pool, OWNER_ID, 100).await.unwrap();

    let admission = engine
        .purchase(&self_service_request(&ad, 15), ts(2026, 3, 1, 12))
        .await
        .unwrap();

    assert!(admission.placement.credit_consumed);
    assert_eq!(admission.placement.credits_spent, 15);
    assert_eq!(admission.placement.user_id, OWNER_ID);
    assert_eq!(
        UserCreditRepo::balance(&pool, OWNER_ID).await.unwrap(),
        Some(85)
    );
}

// ---------------------------------------------------------------------------
// Test: a declined debit admits nothing
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn declined_debit_is_payment_required(pool: PgPool) {
    let engine = engine_with_capacity(&pool, 10);
    let ad = seed_ad(&pool, 1, "active").await;
    UserCreditRepo::grant(&pool, OWNER_ID, 4).await.unwrap();

    let err = engine
        .purchase(&self_service_request(&ad, 15), ts(2026, 3, 1, 12))
        .await
        .unwrap_err();
    assert_matches!(err, EngineError::Core(CoreError::PaymentRequired(_)));

    assert_eq!(
        UserCreditRepo::balance(&pool, OWNER_ID).await.unwrap(),
        Some(4)
    );
    let live = FeaturedPlacementRepo::find_live_for(&pool, ad.id, Placement::Homepage)
        .await
        .unwrap();
    assert!(live.is_none());
}

// ---------------------------------------------------------------------------
// Test: losing the last slot after the debit refunds the credits
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn slot_lost_after_debit_is_refunded(pool: PgPool) {
    let now = ts(2026, 3, 1, 12);
    let ad = seed_ad(&pool, 1, "active").await;
    let rival_ad = seed_ad(&pool, 1, "active").await;
    UserCreditRepo::grant(&pool, OWNER_ID, 100).await.unwrap();

    let rival = engine_with_capacity(&pool, 1);
    let ledger = ContestedLedger {
        inner: PgCreditLedger::new(pool.clone()),
        rival: rival.admission.clone(),
        rival_request: manual_request(&rival_ad, Placement::Homepage, date(2026, 3, 1), 5),
        now,
    };
    let engine = FeaturedEngine::with_collaborators(
        pool.clone(),
        &EngineConfig::default(),
        Arc::new(FixedCapacity(1)),
        Arc::new(PgAdCatalog::new(pool.clone())),
        Arc::new(ledger),
    );

    let err = engine
        .purchase(&self_service_request(&ad, 15), now)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        EngineError::Core(CoreError::CapacityExceeded { occupied: 1, max: 1 })
    );

    assert_eq!(
        UserCreditRepo::balance(&pool, OWNER_ID).await.unwrap(),
        Some(100)
    );
    let live = FeaturedPlacementRepo::find_live_for(&pool, ad.id, Placement::Homepage)
        .await
        .unwrap();
    assert!(live.is_none());
}

// ---------------------------------------------------------------------------
// Test: manual funding cannot be purchased
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn purchase_rejects_manual_funding(pool: PgPool) {
    let engine = engine_with_capacity(&pool, 10);
    let ad = seed_ad(&pool, 1, "active").await;

    let err = engine
        .purchase(
            &manual_request(&ad, Placement::Homepage, date(2026, 3, 1), 5),
            ts(2026, 3, 1, 12),
        )
        .await
        .unwrap_err();
    assert_matches!(err, EngineError::Core(CoreError::Validation(_)));
}
