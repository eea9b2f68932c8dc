//! Shared fixtures for engine integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use adslot_core::featured::{Funding, Placement};
use adslot_core::types::{DbId, Timestamp};
use adslot_db::models::ad::{Ad, CreateAd};
use adslot_db::repositories::AdRepo;
use adslot_engine::{
    Actor, AdmissionRequest, CapacityResolver, EngineConfig, FeaturedEngine, FixedCapacity,
    PgAdCatalog, PgCreditLedger,
};
use chrono::{NaiveDate, TimeZone, Utc};
use sqlx::PgPool;

pub const ADMIN_ID: DbId = 900;

pub fn ts(y: i32, m: u32, d: u32, h: u32) -> Timestamp {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn admin() -> Actor {
    Actor::new(ADMIN_ID, Some("admin@example.com"))
}

/// Insert an ad with the given catalog status.
pub async fn seed_ad(pool: &PgPool, category_id: DbId, status: &str) -> Ad {
    AdRepo::create(
        pool,
        &CreateAd {
            user_id: 10,
            category_id,
            title: format!("Ad in category {category_id}"),
            status: Some(status.to_string()),
        },
    )
    .await
    .unwrap()
}

/// Engine over the real catalog and ledger with a fixed slot limit.
pub fn engine_with_capacity(pool: &PgPool, max_slots: i32) -> FeaturedEngine {
    engine_with_resolver(pool, Arc::new(FixedCapacity(max_slots)))
}

pub fn engine_with_resolver(pool: &PgPool, capacity: Arc<dyn CapacityResolver>) -> FeaturedEngine {
    FeaturedEngine::with_collaborators(
        pool.clone(),
        &EngineConfig::default(),
        capacity,
        Arc::new(PgAdCatalog::new(pool.clone())),
        Arc::new(PgCreditLedger::new(pool.clone())),
    )
}

/// Manual (admin-granted) request for `ad`.
pub fn manual_request(
    ad: &Ad,
    placement: Placement,
    scheduled_start: NaiveDate,
    duration_days: i32,
) -> AdmissionRequest {
    AdmissionRequest {
        ad_id: ad.id,
        category_id: ad.category_id,
        placement,
        scheduled_start,
        duration_days,
        funding: Funding::Manual {
            granted_by: ADMIN_ID,
        },
        requested_by: admin(),
        priority: 0,
        notes: None,
    }
}
