//! Repository for the `platform_settings` key/value table.

use adslot_core::types::DbId;
use sqlx::PgPool;

use crate::models::platform_setting::PlatformSetting;

const COLUMNS: &str = "key, value, updated_by, created_at, updated_at";

/// Provides read and upsert operations for platform settings.
pub struct PlatformSettingRepo;

impl PlatformSettingRepo {
    /// Fetch the raw value stored under `key`.
    pub async fn find_value(pool: &PgPool, key: &str) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT value FROM platform_settings WHERE key = $1")
            .bind(key)
            .fetch_optional(pool)
            .await
    }

    /// Fetch several keys in one round trip. Missing keys are absent from
    /// the result.
    pub async fn find_values(
        pool: &PgPool,
        keys: &[String],
    ) -> Result<Vec<(String, String)>, sqlx::Error> {
        sqlx::query_as::<_, (String, String)>(
            "SELECT key, value FROM platform_settings WHERE key = ANY($1)",
        )
        .bind(keys)
        .fetch_all(pool)
        .await
    }

    /// List settings whose key starts with `prefix`, ordered by key.
    pub async fn list_with_prefix(
        pool: &PgPool,
        prefix: &str,
    ) -> Result<Vec<PlatformSetting>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM platform_settings \
             WHERE starts_with(key, $1) ORDER BY key"
        );
        sqlx::query_as::<_, PlatformSetting>(&query)
            .bind(prefix)
            .fetch_all(pool)
            .await
    }

    /// Create or replace a setting.
    pub async fn upsert(
        pool: &PgPool,
        key: &str,
        value: &str,
        updated_by: Option<DbId>,
    ) -> Result<PlatformSetting, sqlx::Error> {
        let query = format!(
            "INSERT INTO platform_settings (key, value, updated_by) VALUES ($1, $2, $3) \
             ON CONFLICT (key) DO UPDATE \
             SET value = EXCLUDED.value, updated_by = EXCLUDED.updated_by \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PlatformSetting>(&query)
            .bind(key)
            .bind(value)
            .bind(updated_by)
            .fetch_one(pool)
            .await
    }
}
