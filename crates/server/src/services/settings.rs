//! Site settings with a cached public view.
//!
//! The storefront reads public settings (branding, CMS blocks, contact and
//! legal text) on every page, so they are served from a `moka` cache with a
//! 5-minute TTL that every write invalidates. A load that overlaps a write
//! is returned to its caller but not cached.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::db::{RepositoryError, SettingsRepository};
use crate::error::AppError;
use crate::models::setting::{MAX_KEY_LENGTH, PUBLIC_PREFIXES, Setting, is_valid_key};

/// Public settings as a key → value map.
pub type PublicSettings = Arc<BTreeMap<String, JsonValue>>;

const PUBLIC_CACHE_KEY: &str = "public";

/// Settings access with caching.
#[derive(Clone)]
pub struct SettingsService {
    pool: PgPool,
    cache: Cache<&'static str, PublicSettings>,
    /// Bumped by every write.
    generation: Arc<RwLock<u64>>,
}

impl SettingsService {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        let cache = Cache::builder()
            .max_capacity(1)
            .time_to_live(Duration::from_secs(300))
            .build();
        Self {
            pool,
            cache,
            generation: Arc::new(RwLock::new(0)),
        }
    }

    /// Settings visible to anonymous visitors.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the cache is cold and the query fails.
    #[instrument(skip(self))]
    pub async fn public(&self) -> Result<PublicSettings, RepositoryError> {
        if let Some(cached) = self.cache.get(PUBLIC_CACHE_KEY).await {
            debug!("Cache hit for public settings");
            return Ok(cached);
        }

        let generation = *self.generation.read().await;
        let rows = SettingsRepository::new(&self.pool)
            .list_by_prefixes(PUBLIC_PREFIXES)
            .await?;
        let map: PublicSettings = Arc::new(rows.into_iter().map(|s| (s.key, s.value)).collect());
        self.store_if_current(generation, Arc::clone(&map)).await;
        Ok(map)
    }

    /// Cache `map` unless a write happened since `generation` was read.
    async fn store_if_current(&self, generation: u64, map: PublicSettings) -> bool {
        let current = self.generation.read().await;
        if *current != generation {
            debug!("Settings changed during load, not caching");
            return false;
        }
        self.cache.insert(PUBLIC_CACHE_KEY, map).await;
        true
    }

    /// Every setting, for the back office.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn all(&self) -> Result<Vec<Setting>, RepositoryError> {
        SettingsRepository::new(&self.pool).list_all().await
    }

    /// Validate keys and upsert all entries atomically.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an empty update or an invalid key.
    #[instrument(skip(self, entries), fields(count = entries.len()))]
    pub async fn update(&self, entries: BTreeMap<String, JsonValue>) -> Result<(), AppError> {
        if entries.is_empty() {
            return Err(AppError::BadRequest("no settings given".to_owned()));
        }
        if let Some(bad) = entries.keys().find(|k| !is_valid_key(k)) {
            return Err(AppError::BadRequest(format!(
                "invalid setting key {bad:?}: use 1-{MAX_KEY_LENGTH} characters of a-z, 0-9, '_', '.', '-'"
            )));
        }

        let entries: Vec<(String, JsonValue)> = entries.into_iter().collect();
        SettingsRepository::new(&self.pool).upsert_many(&entries).await?;
        self.invalidate().await;
        Ok(())
    }

    /// Delete one setting.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown key.
    pub async fn delete(&self, key: &str) -> Result<(), RepositoryError> {
        SettingsRepository::new(&self.pool).delete(key).await?;
        self.invalidate().await;
        Ok(())
    }

    async fn invalidate(&self) {
        let mut generation = self.generation.write().await;
        *generation += 1;
        self.cache.invalidate(PUBLIC_CACHE_KEY).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use sqlx::postgres::PgPoolOptions;

    use super::*;

    fn service() -> SettingsService {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://spareline@127.0.0.1:1/unreachable")
            .unwrap();
        SettingsService::new(pool)
    }

    fn settings(name: &str) -> PublicSettings {
        Arc::new(BTreeMap::from([(
            "site.name".to_owned(),
            JsonValue::String(name.to_owned()),
        )]))
    }

    #[tokio::test]
    async fn test_load_overlapping_a_write_is_not_cached() {
        let service = service();
        let generation = *service.generation.read().await;

        // A write lands while the old rows are still being read.
        service.invalidate().await;

        assert!(!service.store_if_current(generation, settings("Old name")).await);
        assert!(service.cache.get(PUBLIC_CACHE_KEY).await.is_none());
    }

    #[tokio::test]
    async fn test_load_without_writes_is_cached() {
        let service = service();
        let generation = *service.generation.read().await;

        assert!(service.store_if_current(generation, settings("Spareline")).await);
        let cached = service.cache.get(PUBLIC_CACHE_KEY).await.unwrap();
        assert_eq!(cached["site.name"], "Spareline");

        service.invalidate().await;
        assert!(service.cache.get(PUBLIC_CACHE_KEY).await.is_none());
    }
}
