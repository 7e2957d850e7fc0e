//! Process-local L1 tier backed by Moka.

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tokio::time::Instant;

use crate::error::CacheError;
use crate::tier::Tier;

/// Configuration for [`MokaTier`].
#[derive(Debug, Clone)]
pub struct MokaTierConfig {
    /// Maximum number of entries the tier can hold.
    pub max_capacity: u64,
    /// TTL in seconds applied when a `set` passes a non-positive TTL.
    /// Zero or negative means such entries never expire.
    pub default_ttl_seconds: i64,
}

impl Default for MokaTierConfig {
    fn default() -> Self {
        MokaTierConfig {
            max_capacity: 10_000,
            default_ttl_seconds: 300,
        }
    }
}

#[derive(Clone)]
struct CachedEntry {
    value: String,
    expires_at: Option<Instant>,
}

/// Concurrent bounded local tier on `moka::future::Cache`.
///
/// Capacity eviction is Moka's; per-entry TTLs vary per `set` call, so
/// expiry is tracked on the entry and checked on read, with the expired
/// entry invalidated eagerly.
pub struct MokaTier {
    cache: Cache<String, CachedEntry>,
    default_ttl_seconds: i64,
}

impl MokaTier {
    /// Create a new MokaTier.
    pub fn new(config: MokaTierConfig) -> Self {
        MokaTier {
            cache: Cache::builder().max_capacity(config.max_capacity).build(),
            default_ttl_seconds: config.default_ttl_seconds,
        }
    }

    /// Number of entries currently held (for monitoring).
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait]
impl Tier for MokaTier {
    fn name(&self) -> &'static str {
        "moka"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        match self.cache.get(key).await {
            Some(entry) => {
                if entry.expires_at.is_some_and(|at| at <= Instant::now()) {
                    self.cache.invalidate(key).await;
                    return Ok(None);
                }
                Ok(Some(entry.value))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: i64) -> Result<(), CacheError> {
        let effective = if ttl_seconds > 0 {
            ttl_seconds
        } else {
            self.default_ttl_seconds
        };
        let expires_at = if effective > 0 {
            Some(Instant::now() + Duration::from_secs(effective as u64))
        } else {
            None
        };

        self.cache
            .insert(
                key.to_owned(),
                CachedEntry {
                    value: value.to_owned(),
                    expires_at,
                },
            )
            .await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), CacheError> {
        self.cache.invalidate_all();
        Ok(())
    }
}
