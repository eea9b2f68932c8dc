//! Repository for the append-only `featured_audit_log` table.

use adslot_core::featured::AuditAction;
use adslot_core::types::{DbId, Timestamp};
use sqlx::{PgConnection, PgPool};

use crate::models::featured_audit::{CreateFeaturedAuditEntry, FeaturedAuditEntry};

/// Column list for `featured_audit_log` SELECT queries.
const COLUMNS: &str = "\
    id, placement_id, ad_id, actor_id, actor_label, action, \
    reason, metadata, occurred_at, created_at";

/// Column list for INSERT (excludes auto-generated `id` and `created_at`).
const INSERT_COLUMNS: &str = "\
    placement_id, ad_id, actor_id, actor_label, action, reason, metadata, occurred_at";

/// Number of bound parameters per inserted row.
const PARAMS_PER_ROW: usize = 8;

/// PostgreSQL accepts at most this many bind parameters per statement.
const MAX_BIND_PARAMS: usize = 65_535;

/// Rows per INSERT statement so one statement stays under [`MAX_BIND_PARAMS`].
pub const MAX_ROWS_PER_INSERT: usize = MAX_BIND_PARAMS / PARAMS_PER_ROW;

/// Provides append and query operations for the featured audit trail.
pub struct FeaturedAuditRepo;

impl FeaturedAuditRepo {
    /// Batch insert multiple audit entries.
    ///
    /// Uses multi-row INSERTs of up to [`MAX_ROWS_PER_INSERT`] rows each.
    /// Returns the number of rows written.
    pub async fn batch_insert(
        conn: &mut PgConnection,
        entries: &[CreateFeaturedAuditEntry],
    ) -> Result<u64, sqlx::Error> {
        let mut written = 0;
        for chunk in entries.chunks(MAX_ROWS_PER_INSERT) {
            written += Self::insert_chunk(&mut *conn, chunk).await?;
        }
        Ok(written)
    }

    async fn insert_chunk(
        conn: &mut PgConnection,
        entries: &[CreateFeaturedAuditEntry],
    ) -> Result<u64, sqlx::Error> {
        let mut query = format!("INSERT INTO featured_audit_log ({INSERT_COLUMNS}) VALUES ");
        let mut param_idx = 1usize;
        for (row, _) in entries.iter().enumerate() {
            if row > 0 {
                query.push_str(", ");
            }
            query.push('(');
            for i in 0..PARAMS_PER_ROW {
                if i > 0 {
                    query.push_str(", ");
                }
                query.push_str(&format!("${param_idx}"));
                param_idx += 1;
            }
            query.push(')');
        }

        let mut q = sqlx::query(&query);
        for entry in entries {
            q = q
                .bind(entry.placement_id)
                .bind(entry.ad_id)
                .bind(entry.actor_id)
                .bind(&entry.actor_label)
                .bind(entry.action.as_str())
                .bind(&entry.reason)
                .bind(&entry.metadata)
                .bind(entry.occurred_at);
        }

        Ok(q.execute(conn).await?.rows_affected())
    }

    /// All entries for a placement in the order they were written.
    pub async fn list_for_placement(
        pool: &PgPool,
        placement_id: DbId,
    ) -> Result<Vec<FeaturedAuditEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM featured_audit_log \
             WHERE placement_id = $1 ORDER BY id ASC"
        );
        sqlx::query_as::<_, FeaturedAuditEntry>(&query)
            .bind(placement_id)
            .fetch_all(pool)
            .await
    }

    /// Count entries of `action` whose `occurred_at` lies in `(from, to]`.
    pub async fn count_action_between(
        pool: &PgPool,
        action: AuditAction,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*)::BIGINT FROM featured_audit_log \
             WHERE action = $1 AND occurred_at > $2 AND occurred_at <= $3",
        )
        .bind(action.as_str())
        .bind(from)
        .bind(to)
        .fetch_one(pool)
        .await
    }
}
