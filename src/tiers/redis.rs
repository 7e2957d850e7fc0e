//! Shared L2 tier backed by Redis.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::error::CacheError;
use crate::tier::Tier;

/// Configuration for [`RedisTier`].
#[derive(Debug, Clone, Default)]
pub struct RedisTierConfig {
    /// TTL in seconds applied when a `set` passes a non-positive TTL.
    /// Zero or negative means such entries never expire.
    pub default_ttl_seconds: i64,
    /// When set, entries live as fields of this Redis hash instead of
    /// top-level string keys. Hash fields carry no per-field TTL, and
    /// `clear_all` deletes just the hash rather than flushing the database.
    pub hash_key: Option<String>,
}

/// Redis-backed shared tier.
///
/// Values are stored as plain strings, `SET`/`SETEX` in string mode or
/// `HSET` in hash mode. A Redis nil reply maps to `Ok(None)`; every other
/// error is a backend error for the caller.
pub struct RedisTier {
    conn: ConnectionManager,
    config: RedisTierConfig,
}

impl RedisTier {
    /// Connect the tier.
    pub async fn new(client: redis::Client, config: RedisTierConfig) -> Result<Self, CacheError> {
        let conn = ConnectionManager::new(client)
            .await
            .map_err(CacheError::backend)?;
        Ok(RedisTier { conn, config })
    }

    fn effective_ttl(&self, ttl_seconds: i64) -> i64 {
        if ttl_seconds > 0 {
            ttl_seconds
        } else {
            self.config.default_ttl_seconds
        }
    }
}

#[async_trait]
impl Tier for RedisTier {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = match &self.config.hash_key {
            Some(hash) => conn.hget(hash, key).await.map_err(CacheError::backend)?,
            None => conn.get(key).await.map_err(CacheError::backend)?,
        };
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: i64) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        match &self.config.hash_key {
            Some(hash) => {
                // Hash fields cannot expire individually.
                let _: () = conn
                    .hset(hash, key, value)
                    .await
                    .map_err(CacheError::backend)?;
            }
            None => {
                let ttl = self.effective_ttl(ttl_seconds);
                if ttl > 0 {
                    let _: () = conn
                        .set_ex(key, value, ttl as u64)
                        .await
                        .map_err(CacheError::backend)?;
                } else {
                    let _: () = conn.set(key, value).await.map_err(CacheError::backend)?;
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = match &self.config.hash_key {
            Some(hash) => conn.hdel(hash, key).await.map_err(CacheError::backend)?,
            None => conn.del(key).await.map_err(CacheError::backend)?,
        };
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        match &self.config.hash_key {
            Some(hash) => {
                let _: () = conn.del(hash).await.map_err(CacheError::backend)?;
            }
            None => {
                let _: () = redis::cmd("FLUSHDB")
                    .query_async(&mut conn)
                    .await
                    .map_err(CacheError::backend)?;
            }
        }
        Ok(())
    }
}
