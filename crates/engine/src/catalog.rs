//! Ad catalog collaborator.

use adslot_core::featured::AD_STATUS_ACTIVE;
use adslot_core::types::DbId;
use adslot_db::repositories::AdRepo;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::EngineResult;

/// The catalog fields the admission path needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdSummary {
    pub id: DbId,
    pub user_id: DbId,
    pub category_id: DbId,
    pub status: String,
}

impl AdSummary {
    pub fn is_active(&self) -> bool {
        self.status == AD_STATUS_ACTIVE
    }
}

/// Read access to the ad catalog.
#[async_trait]
pub trait AdCatalog: Send + Sync {
    async fn get_ad(&self, ad_id: DbId) -> EngineResult<Option<AdSummary>>;
}

/// Catalog backed by the `ads` table.
pub struct PgAdCatalog {
    pool: PgPool,
}

impl PgAdCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AdCatalog for PgAdCatalog {
    async fn get_ad(&self, ad_id: DbId) -> EngineResult<Option<AdSummary>> {
        let ad = AdRepo::find_by_id(&self.pool, ad_id).await?;
        Ok(ad.map(|ad| AdSummary {
            id: ad.id,
            user_id: ad.user_id,
            category_id: ad.category_id,
            status: ad.status,
        }))
    }
}
