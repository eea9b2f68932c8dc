//! Featured placement engine.
//!
//! Orchestrates the slot ledger on top of `adslot-db`:
//!
//! - [`admission`] -- capacity-checked admission (manual and self-service).
//! - [`sweeper`] -- time-driven activation and expiry.
//! - [`cancellation`] -- administrative cancel and restore-from-history.
//! - [`capacity`], [`catalog`], [`credits`] -- collaborator traits and their
//!   Postgres implementations.
//!
//! All serialization between concurrent writers is delegated to PostgreSQL
//! (advisory transaction locks, row locks, `SKIP LOCKED`).

use std::sync::Arc;
use std::time::Duration;

use adslot_core::error::CoreError;
use adslot_core::featured::{Funding, Placement};
use adslot_core::types::Timestamp;
use adslot_db::repositories::FeaturedPlacementRepo;
use sqlx::PgPool;

pub mod admission;
pub mod audit;
pub mod cancellation;
pub mod capacity;
pub mod catalog;
pub mod credits;
pub mod error;
pub mod sweeper;

pub use admission::{Admission, AdmissionController, AdmissionRequest, Preflight, SlotUsage};
pub use audit::Actor;
pub use cancellation::CancellationManager;
pub use capacity::{CachedCapacity, CapacityResolver, FixedCapacity, SettingsCapacityResolver};
pub use catalog::{AdCatalog, AdSummary, PgAdCatalog};
pub use credits::{CreditLedger, Debit, PgCreditLedger};
pub use error::{EngineError, EngineResult};
pub use sweeper::{LifecycleSweeper, SweepReport};

/// Default transaction budget for admission and cancellation.
pub const DEFAULT_TX_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default trailing window for `recently_expired`.
pub const DEFAULT_SWEEP_WINDOW: Duration = Duration::from_secs(3600);

/// Default number of rows transitioned per sweep transaction.
pub const DEFAULT_SWEEP_BATCH_SIZE: i64 = 500;

/// Tunables shared by the engine components.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub tx_timeout: Duration,
    pub sweep_window: Duration,
    pub sweep_batch_size: i64,
    /// Zero disables capacity caching.
    pub capacity_cache_ttl: Duration,
}

impl EngineConfig {
    /// Load engine tunables from environment variables.
    ///
    /// | Env Var                   | Default |
    /// |---------------------------|---------|
    /// | `TX_TIMEOUT_MS`           | `5000`  |
    /// | `SWEEP_INTERVAL_SECS`     | `3600`  |
    /// | `SWEEP_BATCH_SIZE`        | `500`   |
    /// | `CAPACITY_CACHE_TTL_SECS` | `0`     |
    ///
    /// The sweep interval doubles as the `recently_expired` window.
    ///
    /// # Panics
    ///
    /// Panics if any variable is set but not a valid number.
    pub fn from_env() -> Self {
        let tx_timeout_ms: u64 = env_or("TX_TIMEOUT_MS", 5000);
        let sweep_interval_secs: u64 = env_or("SWEEP_INTERVAL_SECS", 3600);
        let sweep_batch_size: i64 = env_or("SWEEP_BATCH_SIZE", DEFAULT_SWEEP_BATCH_SIZE);
        let capacity_cache_ttl_secs: u64 = env_or("CAPACITY_CACHE_TTL_SECS", 0);

        assert!(tx_timeout_ms > 0, "TX_TIMEOUT_MS must be positive");
        assert!(sweep_batch_size > 0, "SWEEP_BATCH_SIZE must be positive");

        Self {
            tx_timeout: Duration::from_millis(tx_timeout_ms),
            sweep_window: Duration::from_secs(sweep_interval_secs),
            sweep_batch_size,
            capacity_cache_ttl: Duration::from_secs(capacity_cache_ttl_secs),
        }
    }
}

fn env_or<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("{name} must be a valid number, got '{raw}'")),
        Err(_) => default,
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tx_timeout: DEFAULT_TX_TIMEOUT,
            sweep_window: DEFAULT_SWEEP_WINDOW,
            sweep_batch_size: DEFAULT_SWEEP_BATCH_SIZE,
            capacity_cache_ttl: Duration::ZERO,
        }
    }
}

/// All engine components wired to one pool.
#[derive(Clone)]
pub struct FeaturedEngine {
    pool: PgPool,
    pub admission: AdmissionController,
    pub sweeper: LifecycleSweeper,
    pub cancellation: CancellationManager,
    pub capacity: Arc<dyn CapacityResolver>,
    pub catalog: Arc<dyn AdCatalog>,
    pub credits: Arc<dyn CreditLedger>,
}

impl FeaturedEngine {
    /// Wire the Postgres-backed collaborators.
    pub fn new(pool: PgPool, config: &EngineConfig) -> Self {
        let settings: Arc<dyn CapacityResolver> =
            Arc::new(SettingsCapacityResolver::new(pool.clone()));
        let capacity: Arc<dyn CapacityResolver> = if config.capacity_cache_ttl.is_zero() {
            settings
        } else {
            Arc::new(CachedCapacity::new(settings, config.capacity_cache_ttl))
        };

        Self::with_collaborators(
            pool.clone(),
            config,
            capacity,
            Arc::new(PgAdCatalog::new(pool.clone())),
            Arc::new(PgCreditLedger::new(pool)),
        )
    }

    /// Wire explicit collaborators (tests, alternative catalogs).
    pub fn with_collaborators(
        pool: PgPool,
        config: &EngineConfig,
        capacity: Arc<dyn CapacityResolver>,
        catalog: Arc<dyn AdCatalog>,
        credits: Arc<dyn CreditLedger>,
    ) -> Self {
        let admission = AdmissionController::new(
            pool.clone(),
            Arc::clone(&capacity),
            Arc::clone(&catalog),
            config.tx_timeout,
        );
        let cancellation =
            CancellationManager::new(pool.clone(), admission.clone(), config.tx_timeout);
        let sweeper = LifecycleSweeper::new(
            pool.clone(),
            config.sweep_window,
            config.sweep_batch_size,
            config.tx_timeout,
        );

        Self {
            pool,
            admission,
            sweeper,
            cancellation,
            capacity,
            catalog,
            credits,
        }
    }

    /// Credit cost of featuring on `placement` for `duration_days`.
    pub async fn quote(&self, placement: Placement, duration_days: i32) -> EngineResult<i32> {
        credits::quote(&self.pool, placement, duration_days).await
    }

    /// Self-service purchase: preflight, debit `credits_spent`, then admit.
    ///
    /// The buyer is `request.requested_by`. If admission fails without
    /// committing a row, the debit is refunded before the error is returned.
    pub async fn purchase(
        &self,
        request: &AdmissionRequest,
        now: Timestamp,
    ) -> EngineResult<Admission> {
        let Funding::SelfService { credits_spent } = request.funding else {
            return Err(
                CoreError::Validation("purchase requires self-service funding".into()).into(),
            );
        };
        let user_id = request.requested_by.user_id;

        self.admission.preflight(request, now).await?;

        match self.credits.debit(user_id, credits_spent).await? {
            Debit::Approved => {}
            Debit::Declined => {
                return Err(CoreError::PaymentRequired(format!(
                    "Featuring on {} for {} days costs {credits_spent} credits",
                    request.placement, request.duration_days
                ))
                .into());
            }
        }

        match self.admission.admit(request, now).await {
            Ok(admission) => Ok(admission),
            Err(e) => {
                self.refund_unadmitted(request, credits_spent, &e).await;
                Err(e)
            }
        }
    }

    /// Refund a debit unless the failed admission may still have committed.
    ///
    /// Domain errors are raised before commit. Timeouts and storage errors are
    /// ambiguous, so the ledger is checked for a live row owned by the buyer.
    async fn refund_unadmitted(
        &self,
        request: &AdmissionRequest,
        amount: i32,
        err: &EngineError,
    ) {
        let user_id = request.requested_by.user_id;
        let committed = match err {
            EngineError::Core(_) => false,
            EngineError::Timeout(_) | EngineError::Storage(_) => {
                match FeaturedPlacementRepo::find_live_for(
                    &self.pool,
                    request.ad_id,
                    request.placement,
                )
                .await
                {
                    Ok(live) => {
                        live.is_some_and(|row| row.user_id == user_id && row.credit_consumed)
                    }
                    Err(lookup) => {
                        tracing::error!(
                            user_id,
                            ad_id = request.ad_id,
                            credits = amount,
                            error = %err,
                            lookup_error = %lookup,
                            "Admission outcome unknown after debit, credits not refunded",
                        );
                        return;
                    }
                }
            }
        };

        if committed {
            tracing::warn!(
                user_id,
                ad_id = request.ad_id,
                error = %err,
                "Admission reported an error but its row is live, keeping debit",
            );
            return;
        }

        match self.credits.refund(user_id, amount).await {
            Ok(()) => tracing::info!(
                user_id,
                ad_id = request.ad_id,
                credits = amount,
                error = %err,
                "Credits refunded after failed admission",
            ),
            Err(refund) => tracing::error!(
                user_id,
                ad_id = request.ad_id,
                credits = amount,
                error = %err,
                refund_error = %refund,
                "Refund failed after admission error",
            ),
        }
    }
}
