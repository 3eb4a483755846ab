//! Settings database operations.
//!
//! One flat key/value table holds site branding, CMS blocks, contact and
//! legal text, and back-office metadata. Values are arbitrary JSON.

use serde_json::Value as JsonValue;
use sqlx::PgPool;

use super::RepositoryError;
use crate::models::setting::Setting;

/// Repository for settings.
pub struct SettingsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SettingsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Every setting, ordered by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_all(&self) -> Result<Vec<Setting>, RepositoryError> {
        let rows = sqlx::query_as::<_, Setting>(
            "SELECT key, value, updated_at FROM shop.settings ORDER BY key",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Settings whose key starts with any of `prefixes`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_by_prefixes(&self, prefixes: &[&str]) -> Result<Vec<Setting>, RepositoryError> {
        let patterns: Vec<String> = prefixes.iter().map(|p| format!("{p}%")).collect();
        let rows = sqlx::query_as::<_, Setting>(
            "SELECT key, value, updated_at FROM shop.settings WHERE key LIKE ANY($1) ORDER BY key",
        )
        .bind(&patterns)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Insert or overwrite several settings in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails; nothing is applied in that case.
    pub async fn upsert_many(&self, entries: &[(String, JsonValue)]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        for (key, value) in entries {
            sqlx::query(
                r"
                INSERT INTO shop.settings (key, value)
                VALUES ($1, $2)
                ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
                ",
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Delete a setting.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the key does not exist.
    pub async fn delete(&self, key: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.settings WHERE key = $1")
            .bind(key)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
