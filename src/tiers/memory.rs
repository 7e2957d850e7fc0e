//! In-process HashMap-backed tier.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::CacheError;
use crate::tier::Tier;

/// Configuration for [`MemoryTier`].
#[derive(Debug, Clone, Default)]
pub struct MemoryTierConfig {
    /// TTL in seconds applied when a `set` passes a non-positive TTL.
    /// Zero or negative means such entries never expire.
    pub default_ttl_seconds: i64,
}

struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

/// Simple thread-safe in-memory tier.
///
/// Suitable as a small L1 or as the tier double in tests. Entries are
/// checked for expiry on read; there is no background sweeper, so a key
/// that is never read again occupies memory until deleted or cleared. Use
/// [`MokaTier`](crate::tiers::moka::MokaTier) when a capacity bound matters.
pub struct MemoryTier {
    state: RwLock<HashMap<String, StoredValue>>,
    default_ttl_seconds: i64,
}

impl MemoryTier {
    /// Create a new MemoryTier.
    pub fn new(config: MemoryTierConfig) -> Self {
        MemoryTier {
            state: RwLock::new(HashMap::new()),
            default_ttl_seconds: config.default_ttl_seconds,
        }
    }

    fn expiry(&self, ttl_seconds: i64) -> Option<Instant> {
        let effective = if ttl_seconds > 0 {
            ttl_seconds
        } else {
            self.default_ttl_seconds
        };
        if effective > 0 {
            Some(Instant::now() + Duration::from_secs(effective as u64))
        } else {
            None
        }
    }
}

#[async_trait]
impl Tier for MemoryTier {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        {
            let state = self.state.read().await;
            match state.get(key) {
                None => return Ok(None),
                Some(stored) => {
                    let expired = stored.expires_at.is_some_and(|at| at <= Instant::now());
                    if !expired {
                        return Ok(Some(stored.value.clone()));
                    }
                }
            }
        }

        // Expired: drop the entry under the write lock.
        let mut state = self.state.write().await;
        if let Some(stored) = state.get(key) {
            if stored.expires_at.is_some_and(|at| at <= Instant::now()) {
                state.remove(key);
            }
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: i64) -> Result<(), CacheError> {
        let mut state = self.state.write().await;
        state.insert(
            key.to_owned(),
            StoredValue {
                value: value.to_owned(),
                expires_at: self.expiry(ttl_seconds),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut state = self.state.write().await;
        state.remove(key);
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), CacheError> {
        let mut state = self.state.write().await;
        state.clear();
        Ok(())
    }
}
