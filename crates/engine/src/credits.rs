//! Credit ledger collaborator and placement pricing.
//!
//! Admission never touches credits. Self-service purchases quote a price,
//! debit through a [`CreditLedger`], and only then admit; see
//! [`FeaturedEngine::purchase`](crate::FeaturedEngine::purchase).

use adslot_core::capacity::{credit_cost, default_price_per_day, parse_positive, price_setting_key};
use adslot_core::featured::Placement;
use adslot_core::types::DbId;
use adslot_db::repositories::{PlatformSettingRepo, UserCreditRepo};
use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::EngineResult;

/// Outcome of a debit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Debit {
    Approved,
    /// Balance too low or no credit account.
    Declined,
}

#[async_trait]
pub trait CreditLedger: Send + Sync {
    async fn debit(&self, user_id: DbId, amount: i32) -> EngineResult<Debit>;

    /// Return credits from a debit whose admission never committed.
    async fn refund(&self, user_id: DbId, amount: i32) -> EngineResult<()>;
}

/// Ledger backed by the `user_credits` table (guarded decrement).
pub struct PgCreditLedger {
    pool: PgPool,
}

impl PgCreditLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CreditLedger for PgCreditLedger {
    async fn debit(&self, user_id: DbId, amount: i32) -> EngineResult<Debit> {
        let debited = UserCreditRepo::debit(&self.pool, user_id, amount).await?;
        Ok(if debited { Debit::Approved } else { Debit::Declined })
    }

    async fn refund(&self, user_id: DbId, amount: i32) -> EngineResult<()> {
        UserCreditRepo::grant(&self.pool, user_id, amount).await?;
        Ok(())
    }
}

/// Credit price per day for a placement (`featured_price_<placement>`).
///
/// Missing or malformed settings, and store failures, yield the default.
pub async fn price_per_day(pool: &PgPool, placement: Placement) -> i32 {
    match PlatformSettingRepo::find_value(pool, &price_setting_key(placement)).await {
        Ok(value) => value
            .as_deref()
            .and_then(parse_positive)
            .unwrap_or_else(|| default_price_per_day(placement)),
        Err(e) => {
            tracing::warn!(error = %e, placement = %placement, "Price lookup failed, using default");
            default_price_per_day(placement)
        }
    }
}

/// Total credits for featuring on `placement` for `duration_days`.
pub async fn quote(pool: &PgPool, placement: Placement, duration_days: i32) -> EngineResult<i32> {
    let price = price_per_day(pool, placement).await;
    Ok(credit_cost(price, duration_days)?)
}
