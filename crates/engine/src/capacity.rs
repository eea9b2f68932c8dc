//! Capacity configuration resolvers.
//!
//! The admission path asks a [`CapacityResolver`] for the slot limit of a
//! `(category, placement)` pool. Resolution never fails the caller: a store
//! failure degrades to the compiled-in default.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use adslot_core::capacity::{
    category_slots_setting_key, default_max_slots, resolve_layers, slots_setting_key,
};
use adslot_core::featured::Placement;
use adslot_core::types::DbId;
use adslot_db::repositories::PlatformSettingRepo;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::EngineResult;

/// Resolves `max_slots(category, placement)`.
#[async_trait]
pub trait CapacityResolver: Send + Sync {
    /// Resolve the limit, surfacing store failures.
    async fn try_max_slots(&self, category_id: DbId, placement: Placement) -> EngineResult<i32>;

    /// Resolve the limit, falling back to the compiled-in default when the
    /// store is unavailable.
    async fn max_slots(&self, category_id: DbId, placement: Placement) -> i32 {
        match self.try_max_slots(category_id, placement).await {
            Ok(max) => max,
            Err(e) => {
                let fallback = default_max_slots(placement);
                tracing::warn!(
                    error = %e,
                    category_id,
                    placement = %placement,
                    fallback,
                    "Capacity lookup failed, using default",
                );
                fallback
            }
        }
    }

    /// Drop any cached values. No-op for uncached resolvers.
    fn invalidate(&self) {}
}

// ---------------------------------------------------------------------------
// Settings-backed resolver
// ---------------------------------------------------------------------------

/// Read-through resolver over the `platform_settings` table.
///
/// Layers: category override, then global key, then default.
pub struct SettingsCapacityResolver {
    pool: PgPool,
}

impl SettingsCapacityResolver {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CapacityResolver for SettingsCapacityResolver {
    async fn try_max_slots(&self, category_id: DbId, placement: Placement) -> EngineResult<i32> {
        let override_key = category_slots_setting_key(placement, category_id);
        let global_key = slots_setting_key(placement);

        let rows =
            PlatformSettingRepo::find_values(&self.pool, &[override_key.clone(), global_key.clone()])
                .await?;

        let lookup = |key: &str| {
            rows.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        Ok(resolve_layers(placement, lookup(&override_key), lookup(&global_key)))
    }
}

// ---------------------------------------------------------------------------
// Fixed resolver
// ---------------------------------------------------------------------------

/// Returns the same limit for every pool.
#[derive(Debug, Clone, Copy)]
pub struct FixedCapacity(pub i32);

#[async_trait]
impl CapacityResolver for FixedCapacity {
    async fn try_max_slots(&self, _category_id: DbId, _placement: Placement) -> EngineResult<i32> {
        Ok(self.0)
    }
}

// ---------------------------------------------------------------------------
// Cached resolver
// ---------------------------------------------------------------------------

type CacheKey = (DbId, Placement);

/// TTL cache in front of another resolver.
///
/// When the inner resolver fails, a previously cached value is served if it
/// is stricter than the compiled-in default.
pub struct CachedCapacity {
    inner: Arc<dyn CapacityResolver>,
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, (i32, Instant)>>,
}

impl CachedCapacity {
    pub fn new(inner: Arc<dyn CapacityResolver>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, key: CacheKey) -> Option<(i32, bool)> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&key)
            .map(|(max, stored_at)| (*max, stored_at.elapsed() < self.ttl))
    }

    fn store(&self, key: CacheKey, max: i32) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, (max, Instant::now()));
    }
}

#[async_trait]
impl CapacityResolver for CachedCapacity {
    async fn try_max_slots(&self, category_id: DbId, placement: Placement) -> EngineResult<i32> {
        let key = (category_id, placement);
        if let Some((max, true)) = self.cached(key) {
            return Ok(max);
        }
        let max = self.inner.try_max_slots(category_id, placement).await?;
        self.store(key, max);
        Ok(max)
    }

    async fn max_slots(&self, category_id: DbId, placement: Placement) -> i32 {
        match self.try_max_slots(category_id, placement).await {
            Ok(max) => max,
            Err(e) => {
                let fallback = default_max_slots(placement);
                let stale = self.cached((category_id, placement)).map(|(max, _)| max);
                let max = stale.map_or(fallback, |s| s.min(fallback));
                tracing::warn!(
                    error = %e,
                    category_id,
                    placement = %placement,
                    max,
                    "Capacity refresh failed, serving fallback",
                );
                max
            }
        }
    }

    fn invalidate(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.inner.invalidate();
    }
}
