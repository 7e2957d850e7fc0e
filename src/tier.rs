//! Capability contracts for cache levels and the authoritative source.

use async_trait::async_trait;

use crate::error::CacheError;

/// A tier is one layer of the cache hierarchy: the process-local L1 or the
/// shared L2.
///
/// The tier owns its storage, capacity management and eviction; the
/// orchestrator only reads, writes and deletes through this contract.
///
/// `Ok(None)` from `get` means the key is not present. Errors are reserved
/// for real backend failures and abort the caller's operation.
#[async_trait]
pub trait Tier: Send + Sync {
    /// A short name for logging.
    ///
    /// # Example
    /// - "memory"
    /// - "moka"
    /// - "redis"
    fn name(&self) -> &'static str;

    /// Return the cached value, or `None` on a miss.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a value with an expiry.
    ///
    /// `ttl_seconds <= 0` means the entry never expires (the tier may still
    /// evict it for capacity).
    async fn set(&self, key: &str, value: &str, ttl_seconds: i64) -> Result<(), CacheError>;

    /// Remove the key from the tier.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Drop every entry in the tier.
    async fn clear_all(&self) -> Result<(), CacheError>;
}

/// The slow system-of-record behind all cache tiers.
///
/// Signature-identical to [`Tier`] but semantically distinct: the
/// orchestrator never fills it on a read path, and its errors are never
/// treated as "absent"; they always abort the caller's operation.
#[async_trait]
pub trait AuthoritativeSource: Send + Sync {
    /// A short name for logging.
    fn name(&self) -> &'static str;

    /// Fetch the value from the system of record, or `None` if it has none.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Write the value to the system of record.
    async fn set(&self, key: &str, value: &str, ttl_seconds: i64) -> Result<(), CacheError>;

    /// Delete the key from the system of record.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Clear the system of record.
    async fn clear_all(&self) -> Result<(), CacheError>;
}
