//! Rate-limit deferrals keyed by `(provider_id, external_id)`.
//!
//! The claim query skips any job whose identifier has a deferral in the
//! future, so a provider is never asked to resolve the same identifier again
//! before its advertised retry-after elapses, by any scheduler process.

use std::time::Duration;

use anyhow::Result;
use sqlx::Row;

use super::clock::now_micros;
use super::db::JobDb;
use super::types::ProviderId;

impl JobDb {
    /// Defer `(provider_id, external_id)` for `retry_after`. Returns the deadline (micros).
    ///
    /// An existing deferral is only ever extended, never shortened.
    pub async fn defer_identifier(
        &self,
        provider_id: ProviderId,
        external_id: &str,
        retry_after: Duration,
    ) -> Result<i64> {
        let micros = i64::try_from(retry_after.as_micros()).unwrap_or(i64::MAX / 2);
        let until = now_micros().saturating_add(micros.max(1));
        sqlx::query(
            r#"
            INSERT INTO rate_limit_deferrals (provider_id, external_id, until_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(provider_id, external_id)
            DO UPDATE SET until_at = MAX(until_at, excluded.until_at)
            "#,
        )
        .bind(provider_id)
        .bind(external_id)
        .bind(until)
        .execute(&self.pool)
        .await?;
        Ok(until)
    }

    /// Deadline of a live deferral, if any.
    pub async fn deferral_until(
        &self,
        provider_id: ProviderId,
        external_id: &str,
    ) -> Result<Option<i64>> {
        let row = sqlx::query(
            r#"
            SELECT until_at FROM rate_limit_deferrals
            WHERE provider_id = ?1 AND external_id = ?2 AND until_at > ?3
            "#,
        )
        .bind(provider_id)
        .bind(external_id)
        .bind(now_micros())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.get("until_at")))
    }

    /// Drop expired deferrals. Returns how many rows were removed.
    pub async fn purge_expired_deferrals(&self) -> Result<u64> {
        let res = sqlx::query("DELETE FROM rate_limit_deferrals WHERE until_at <= ?1")
            .bind(now_micros())
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }
}
