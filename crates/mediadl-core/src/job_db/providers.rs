//! Provider rows and the shared pause registry.
//!
//! Pauses are rows in `provider_pauses`, so every scheduler process sharing
//! the database sees the same set. A pause stays until an operator clears it.

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::clock::now_micros;
use super::db::JobDb;
use super::types::{ProviderId, ProviderPause, ProviderRecord};

fn provider_from_row(row: &SqliteRow) -> ProviderRecord {
    let enabled: i64 = row.get("enabled");
    ProviderRecord {
        id: row.get("id"),
        key: row.get("key"),
        display_name: row.get("display_name"),
        enabled: enabled != 0,
        config_json: row.get("config_json"),
    }
}

impl JobDb {
    /// Register a provider. `config_json` is the plaintext configuration.
    pub async fn add_provider(
        &self,
        key: &str,
        display_name: &str,
        config_json: &str,
    ) -> Result<ProviderId> {
        serde_json::from_str::<serde_json::Value>(config_json)
            .map_err(|e| anyhow::anyhow!("provider config is not valid JSON: {e}"))?;
        let id = sqlx::query(
            r#"
            INSERT INTO providers (key, display_name, enabled, config_json)
            VALUES (?1, ?2, 1, ?3)
            "#,
        )
        .bind(key)
        .bind(display_name)
        .bind(config_json)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    pub async fn get_provider(&self, id: ProviderId) -> Result<Option<ProviderRecord>> {
        let row = sqlx::query(
            "SELECT id, key, display_name, enabled, config_json FROM providers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(provider_from_row))
    }

    /// First enabled provider with the given key.
    pub async fn get_provider_by_key(&self, key: &str) -> Result<Option<ProviderRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, key, display_name, enabled, config_json FROM providers
            WHERE key = ?1 AND enabled = 1
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(provider_from_row))
    }

    pub async fn list_providers(&self) -> Result<Vec<ProviderRecord>> {
        let rows = sqlx::query(
            "SELECT id, key, display_name, enabled, config_json FROM providers ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(provider_from_row).collect())
    }

    /// Pause a provider. Re-pausing keeps the original timestamp and updates the reason.
    pub async fn pause_provider(&self, id: ProviderId, reason: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO provider_pauses (provider_id, reason, paused_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(provider_id) DO UPDATE SET reason = excluded.reason
            "#,
        )
        .bind(id)
        .bind(reason)
        .bind(now_micros())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Clear a pause. Returns whether one existed.
    pub async fn clear_provider_pause(&self, id: ProviderId) -> Result<bool> {
        let res = sqlx::query("DELETE FROM provider_pauses WHERE provider_id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn provider_pause(&self, id: ProviderId) -> Result<Option<ProviderPause>> {
        let row = sqlx::query(
            "SELECT provider_id, reason, paused_at FROM provider_pauses WHERE provider_id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| ProviderPause {
            provider_id: r.get("provider_id"),
            reason: r.get("reason"),
            paused_at: r.get("paused_at"),
        }))
    }

    pub async fn is_provider_paused(&self, id: ProviderId) -> Result<bool> {
        Ok(self.provider_pause(id).await?.is_some())
    }

    pub async fn list_provider_pauses(&self) -> Result<Vec<ProviderPause>> {
        let rows = sqlx::query(
            "SELECT provider_id, reason, paused_at FROM provider_pauses ORDER BY provider_id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| ProviderPause {
                provider_id: r.get("provider_id"),
                reason: r.get("reason"),
                paused_at: r.get("paused_at"),
            })
            .collect())
    }
}
