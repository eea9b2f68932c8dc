//! Repository for the `ads` catalog projection.

use adslot_core::types::DbId;
use sqlx::PgPool;

use crate::models::ad::{Ad, CreateAd};

const COLUMNS: &str = "id, user_id, category_id, title, status, created_at, updated_at";

/// Provides read access to the ad catalog, plus inserts for seeding.
pub struct AdRepo;

impl AdRepo {
    /// Insert an ad. Status defaults to `draft`.
    pub async fn create(pool: &PgPool, input: &CreateAd) -> Result<Ad, sqlx::Error> {
        let query = format!(
            "INSERT INTO ads (user_id, category_id, title, status) \
             VALUES ($1, $2, $3, COALESCE($4, 'draft')) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Ad>(&query)
            .bind(input.user_id)
            .bind(input.category_id)
            .bind(&input.title)
            .bind(&input.status)
            .fetch_one(pool)
            .await
    }

    /// Find an ad by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Ad>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM ads WHERE id = $1");
        sqlx::query_as::<_, Ad>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
