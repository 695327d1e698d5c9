use anyhow::Result;
use chrono::NaiveDate;
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use crate::tiers::{StyleId, TierId};

/// Per-user usage counters and tier assignment. `tier` is parsed once at
/// the storage boundary; unknown values land on `Free`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRecord {
    pub user_id: String,
    pub tier: TierId,
    pub rewrites_today: u32,
    pub rewrites_total: i64,
    pub last_rewrite_date: NaiveDate,
    pub subscription_id: Option<String>,
}

fn record_from_row(row: &PgRow) -> UsageRecord {
    let tier: String = row.get("tier");
    let rewrites_today: i32 = row.get("rewrites_today");
    UsageRecord {
        user_id: row.get("user_id"),
        tier: TierId::parse_or_free(&tier),
        rewrites_today: rewrites_today.max(0) as u32,
        rewrites_total: row.get("rewrites_total"),
        last_rewrite_date: row.get("last_rewrite_date"),
        subscription_id: row.get("subscription_id"),
    }
}

const RECORD_COLUMNS: &str =
    "user_id, tier, rewrites_today, rewrites_total, last_rewrite_date, subscription_id";

/// Durable store for `UsageRecord`s, keyed by user id.
#[derive(Clone)]
pub struct UsageLedger {
    pool: PgPool,
}

impl UsageLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads the caller's record, creating a fresh free-tier one on first
    /// authenticated interaction.
    pub async fn load_or_create(&self, user_id: &str, today: NaiveDate) -> Result<UsageRecord> {
        sqlx::query(
            r#"
            INSERT INTO usage_records (user_id, tier, rewrites_today, rewrites_total, last_rewrite_date)
            VALUES ($1, 'free', 0, 0, $2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(today)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM usage_records WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(record_from_row(&row))
    }

    /// Persists the calendar-day reset. Idempotent; a no-op when the record
    /// is already dated `today`. Must land even when the request is later
    /// rejected, so the reset is not lost.
    pub async fn apply_rollover(&self, user_id: &str, today: NaiveDate) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE usage_records
            SET rewrites_today = 0, last_rewrite_date = $2, updated_at = NOW()
            WHERE user_id = $1 AND last_rewrite_date <> $2
            "#,
        )
        .bind(user_id)
        .bind(today)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Atomic increment-with-ceiling. The `rewrites_today < limit` guard
    /// serializes concurrent commits from one account at the storage layer;
    /// `None` means another in-flight request took the last slot.
    pub async fn commit_rewrite(
        &self,
        user_id: &str,
        today: NaiveDate,
        limit: u32,
    ) -> Result<Option<UsageRecord>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE usage_records
            SET rewrites_today = rewrites_today + 1,
                rewrites_total = rewrites_total + 1,
                last_rewrite_date = $2,
                updated_at = NOW()
            WHERE user_id = $1 AND last_rewrite_date = $2 AND rewrites_today < $3
            RETURNING {RECORD_COLUMNS}
            "#,
        ))
        .bind(user_id)
        .bind(today)
        .bind(limit as i32)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| record_from_row(&row)))
    }

    /// Entitlement change: assigns a new tier, upserting so a billing event
    /// can land before the user's first rewrite.
    pub async fn set_tier(
        &self,
        user_id: &str,
        tier: TierId,
        subscription_id: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO usage_records (user_id, tier, rewrites_today, rewrites_total, last_rewrite_date, subscription_id)
            VALUES ($1, $2, 0, 0, CURRENT_DATE, $3)
            ON CONFLICT (user_id) DO UPDATE SET
                tier = EXCLUDED.tier,
                subscription_id = EXCLUDED.subscription_id,
                updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(tier.as_str())
        .bind(subscription_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Cancellation: back to free, subscription reference dropped. Usage
    /// counters are left untouched.
    pub async fn cancel_subscription(&self, user_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE usage_records
            SET tier = 'free', subscription_id = NULL, updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Best-effort history row for a completed rewrite. Callers log and
    /// swallow failures; history never blocks the response.
    pub async fn record_history(
        &self,
        user_id: &str,
        style: StyleId,
        input_chars: usize,
        output_chars: usize,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO rewrite_history (id, user_id, style, input_chars, output_chars)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(style.as_str())
        .bind(input_chars as i32)
        .bind(output_chars as i32)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
