//! Postgres-backed usage store.
//!
//! SYSTEM CONTEXT
//! ==============
//! The in-memory store is per-process: a horizontally scaled deployment
//! would hand each instance its own counters. Pointing `DATABASE_URL` at a
//! shared Postgres makes the ledger instance-safe — the increment is a
//! single atomic upsert, so concurrent requests across instances cannot
//! lose updates.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::store::{StoreError, UsageEntry, UsageStore};

pub struct PgUsageStore {
    pool: PgPool,
}

impl PgUsageStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss, clippy::cast_possible_truncation)]
#[async_trait]
impl UsageStore for PgUsageStore {
    async fn get(&self, key: &str) -> Result<Option<UsageEntry>, StoreError> {
        let row = sqlx::query(
            "SELECT count, window_start, reset_at FROM usage_entries WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| UsageEntry {
            count: r.get::<i32, _>("count") as u32,
            window_start: r.get::<i64, _>("window_start") as u64,
            reset_at: r.get::<i64, _>("reset_at") as u64,
        }))
    }

    async fn upsert(&self, key: &str, entry: UsageEntry) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO usage_entries (key, count, window_start, reset_at)
              VALUES ($1, $2, $3, $4)
              ON CONFLICT (key) DO UPDATE SET
                  count = EXCLUDED.count,
                  window_start = EXCLUDED.window_start,
                  reset_at = EXCLUDED.reset_at",
        )
        .bind(key)
        .bind(entry.count as i32)
        .bind(entry.window_start as i64)
        .bind(entry.reset_at as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn increment(
        &self,
        key: &str,
        now: u64,
        window_secs: u64,
    ) -> Result<UsageEntry, StoreError> {
        // Window rollover happens inside the upsert so the whole step is one
        // atomic statement.
        let row = sqlx::query(
            r"INSERT INTO usage_entries (key, count, window_start, reset_at)
              VALUES ($1, 1, $2, $3)
              ON CONFLICT (key) DO UPDATE SET
                  count = CASE WHEN usage_entries.reset_at <= $2
                               THEN 1 ELSE usage_entries.count + 1 END,
                  window_start = CASE WHEN usage_entries.reset_at <= $2
                                      THEN $2 ELSE usage_entries.window_start END,
                  reset_at = CASE WHEN usage_entries.reset_at <= $2
                                  THEN $3 ELSE usage_entries.reset_at END
              RETURNING count, window_start, reset_at",
        )
        .bind(key)
        .bind(now as i64)
        .bind((now + window_secs) as i64)
        .fetch_one(&self.pool)
        .await?;

        Ok(UsageEntry {
            count: row.get::<i32, _>("count") as u32,
            window_start: row.get::<i64, _>("window_start") as u64,
            reset_at: row.get::<i64, _>("reset_at") as u64,
        })
    }

    async fn delete_expired(&self, now: u64) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM usage_entries WHERE reset_at <= $1")
            .bind(now as i64)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(all(test, feature = "live-db-tests"))]
#[path = "pg_test.rs"]
mod tests;
