//! Repository for the `user_credits` balance table.

use adslot_core::types::DbId;
use sqlx::PgPool;

/// Provides balance reads and guarded debits.
pub struct UserCreditRepo;

impl UserCreditRepo {
    /// Current balance, or `None` if the user has no credit account.
    pub async fn balance(pool: &PgPool, user_id: DbId) -> Result<Option<i32>, sqlx::Error> {
        sqlx::query_scalar::<_, i32>("SELECT balance FROM user_credits WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Atomically subtract `amount` if the balance covers it.
    ///
    /// Returns `false` (and changes nothing) when the account is missing or
    /// the balance is too low.
    pub async fn debit(pool: &PgPool, user_id: DbId, amount: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE user_credits SET balance = balance - $2 \
             WHERE user_id = $1 AND balance >= $2",
        )
        .bind(user_id)
        .bind(amount)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Add `amount` to a user's balance, creating the account if needed.
    pub async fn grant(pool: &PgPool, user_id: DbId, amount: i32) -> Result<i32, sqlx::Error> {
        sqlx::query_scalar::<_, i32>(
            "INSERT INTO user_credits (user_id, balance) VALUES ($1, $2) \
             ON CONFLICT (user_id) DO UPDATE SET balance = user_credits.balance + EXCLUDED.balance \
             RETURNING balance",
        )
        .bind(user_id)
        .bind(amount)
        .fetch_one(pool)
        .await
    }
}
